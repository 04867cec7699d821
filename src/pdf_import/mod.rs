//! PDF Statement Import Module
//!
//! Imports credit-card and bank statements that only exist as scanned or
//! image-based PDFs: pages are rasterized, run through OCR, matched against
//! the pt-BR transaction line grammar and persisted as expenses, one atomic
//! batch per document.

pub mod error;
pub mod grammar;
pub mod locator;
pub mod normalize;
pub mod ocr;
pub mod pipeline;
pub mod raster;
pub mod scratch;

pub use error::{DocumentError, DropReason, ImportError};
pub use pipeline::ImportPipeline;

use crate::models::ImportBatch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where the statements of one import call come from
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// A directory searched recursively for PDFs, or a single PDF file
    Path(PathBuf),
    /// A file received from a client, e.g. an HTTP upload
    Upload { file_name: String, bytes: Vec<u8> },
}

/// Last stage a document reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentStage {
    Discovered,
    Rasterized,
    Extracted,
    Parsed,
    Validated,
    Persisted,
}

/// Final state of a document, reported after its scratch cleanup ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DocumentOutcome {
    Done,
    Failed { stage: DocumentStage, error: String },
}

/// Per-document part of an import summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReport {
    pub source_file: String,
    pub outcome: DocumentOutcome,
    pub pages: usize,
    pub candidates_matched: usize,
    pub candidates_dropped: BTreeMap<String, usize>,
    pub expenses_validated: usize,
    pub expenses_persisted: usize,
    pub cleanup_error: Option<String>,
}

impl DocumentReport {
    pub fn is_done(&self) -> bool {
        self.outcome == DocumentOutcome::Done
    }
}

/// Result of one import call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub candidates_matched: usize,
    pub candidates_dropped: BTreeMap<String, usize>,
    pub expenses_validated: usize,
    pub expenses_persisted: usize,
    pub documents: Vec<DocumentReport>,
}

impl ImportSummary {
    fn record(&mut self, report: DocumentReport) {
        self.documents_processed += 1;
        if !report.is_done() {
            self.documents_failed += 1;
        }
        self.candidates_matched += report.candidates_matched;
        for (reason, count) in &report.candidates_dropped {
            *self.candidates_dropped.entry(reason.clone()).or_default() += count;
        }
        self.expenses_validated += report.expenses_validated;
        self.expenses_persisted += report.expenses_persisted;
        self.documents.push(report);
    }

    pub fn total_dropped(&self) -> usize {
        self.candidates_dropped.values().sum()
    }
}

/// Dry-run result: the summary plus the batches that would be written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub summary: ImportSummary,
    pub batches: Vec<ImportBatch>,
}
