pub mod config;
pub mod db;
pub mod models;
pub mod pdf_import;

pub use config::ImportConfig;
pub use pdf_import::{ImportPipeline, ImportSource, ImportSummary};
