//! Importer settings
//!
//! Read from an optional JSON file, then overridden by environment
//! variables. Every field has a default, so an empty `{}` is valid.

use crate::models::NotesOverflow;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB: &str = "STATEMENT_IMPORT_DB";
pub const ENV_SCRATCH: &str = "STATEMENT_IMPORT_SCRATCH";
pub const ENV_OCR_LANG: &str = "STATEMENT_IMPORT_OCR_LANG";
pub const ENV_TIMEOUT_SECS: &str = "STATEMENT_IMPORT_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportConfig {
    pub database_path: PathBuf,
    pub scratch_root: PathBuf,
    pub dpi: u32,
    pub ocr_language: String,
    pub ocr_page_seg_mode: u32,
    pub document_timeout_secs: u64,
    pub notes_overflow: NotesOverflow,
    pub pdftoppm_command: String,
    pub pdfinfo_command: String,
    pub tesseract_command: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            database_path: data_dir.join("statement-import").join("expenses.db"),
            scratch_root: std::env::temp_dir().join("statement-import"),
            dpi: 150,
            ocr_language: "por".to_string(),
            ocr_page_seg_mode: 3,
            document_timeout_secs: 300,
            notes_overflow: NotesOverflow::Reject,
            pdftoppm_command: "pdftoppm".to_string(),
            pdfinfo_command: "pdfinfo".to_string(),
            tesseract_command: "tesseract".to_string(),
        }
    }
}

impl ImportConfig {
    /// Load settings from `path` (if given) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(scratch) = lookup(ENV_SCRATCH) {
            self.scratch_root = PathBuf::from(scratch);
        }
        if let Some(lang) = lookup(ENV_OCR_LANG) {
            self.ocr_language = lang;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.document_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got '{}'", ENV_TIMEOUT_SECS, secs))?;
        }
        Ok(self)
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }
}
