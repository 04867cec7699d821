//! Import orchestration
//!
//! Runs discovered statements one at a time through
//! rasterize → OCR → match → normalize → validate → persist, and always
//! removes the document's scratch directory before reporting on it.

use super::error::{DocumentError, DropReason, ImportError};
use super::grammar::{CandidateMatch, GrammarError, TransactionGrammar};
use super::locator::{locate_documents, stage_upload};
use super::normalize::{LocaleNormalizer, NormalizedTransaction};
use super::ocr::{extract_text, OcrEngine, TesseractEngine};
use super::raster::{PopplerRasterizer, Rasterizer};
use super::scratch::ScratchDir;
use super::{
    DocumentOutcome, DocumentReport, DocumentStage, ImportSource, ImportSummary, PreviewResult,
};
use crate::config::ImportConfig;
use crate::db::ExpenseStore;
use crate::models::{ExpenseRecord, ImportBatch, NotesOverflow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Whether validated batches are written or only returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Persist,
    Preview,
}

/// Candidates split into survivors and drop reasons
struct Fold<T> {
    kept: Vec<T>,
    dropped: Vec<DropReason>,
}

impl<T> Fold<T> {
    fn new() -> Self {
        Self {
            kept: Vec::new(),
            dropped: Vec::new(),
        }
    }
}

/// Progress of one document, turned into a [`DocumentReport`] at the end
struct DocumentRun {
    source_file: String,
    stage: DocumentStage,
    pages: usize,
    candidates_matched: usize,
    candidates_dropped: BTreeMap<String, usize>,
    expenses_validated: usize,
    expenses_persisted: usize,
}

impl DocumentRun {
    fn new(source_file: &str) -> Self {
        Self {
            source_file: source_file.to_string(),
            stage: DocumentStage::Discovered,
            pages: 0,
            candidates_matched: 0,
            candidates_dropped: BTreeMap::new(),
            expenses_validated: 0,
            expenses_persisted: 0,
        }
    }

    fn count_drops(&mut self, dropped: &[DropReason]) {
        for reason in dropped {
            log::warn!("PDF Import: Dropped candidate in {}: {}", self.source_file, reason);
            *self.candidates_dropped.entry(reason.key().to_string()).or_default() += 1;
        }
    }

    fn into_report(self, outcome: DocumentOutcome, cleanup_error: Option<String>) -> DocumentReport {
        DocumentReport {
            source_file: self.source_file,
            outcome,
            pages: self.pages,
            candidates_matched: self.candidates_matched,
            candidates_dropped: self.candidates_dropped,
            expenses_validated: self.expenses_validated,
            expenses_persisted: self.expenses_persisted,
            cleanup_error,
        }
    }
}

/// The document-ingestion pipeline.
///
/// Rasterizer and OCR engine are pluggable; grammar and month table are
/// immutable values fixed at construction.
pub struct ImportPipeline<R, O> {
    rasterizer: R,
    ocr: O,
    grammar: TransactionGrammar,
    normalizer: LocaleNormalizer,
    scratch_root: PathBuf,
    document_timeout: Duration,
    notes_overflow: NotesOverflow,
}

impl ImportPipeline<PopplerRasterizer, TesseractEngine> {
    /// Production pipeline (poppler + tesseract, pt-BR grammar)
    pub fn from_config(config: &ImportConfig) -> Result<Self, GrammarError> {
        let rasterizer = PopplerRasterizer {
            pdftoppm: config.pdftoppm_command.clone(),
            pdfinfo: config.pdfinfo_command.clone(),
            dpi: config.dpi,
        };
        let ocr = TesseractEngine {
            command: config.tesseract_command.clone(),
            language: config.ocr_language.clone(),
            page_seg_mode: config.ocr_page_seg_mode,
        };

        Ok(ImportPipeline::new(
            rasterizer,
            ocr,
            TransactionGrammar::pt_br()?,
            LocaleNormalizer::pt_br(),
            config.scratch_root.clone(),
        )
        .with_document_timeout(config.document_timeout())
        .with_notes_overflow(config.notes_overflow))
    }
}

impl<R: Rasterizer, O: OcrEngine> ImportPipeline<R, O> {
    pub fn new(
        rasterizer: R,
        ocr: O,
        grammar: TransactionGrammar,
        normalizer: LocaleNormalizer,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            rasterizer,
            ocr,
            grammar,
            normalizer,
            scratch_root,
            document_timeout: Duration::from_secs(300),
            notes_overflow: NotesOverflow::Reject,
        }
    }

    pub fn with_document_timeout(mut self, timeout: Duration) -> Self {
        self.document_timeout = timeout;
        self
    }

    pub fn with_notes_overflow(mut self, overflow: NotesOverflow) -> Self {
        self.notes_overflow = overflow;
        self
    }

    /// Import every statement of `source` for `user_id`.
    ///
    /// Every expense gets `default_category_id`. Failed documents are
    /// reported in the summary and do not stop the remaining ones.
    pub async fn import_pdf<S: ExpenseStore>(
        &self,
        store: &mut S,
        user_id: &str,
        default_category_id: &str,
        source: ImportSource,
    ) -> Result<ImportSummary, ImportError> {
        let (summary, _) = self
            .run(store, user_id, default_category_id, source, RunMode::Persist)
            .await?;
        Ok(summary)
    }

    /// Same as [`ImportPipeline::import_pdf`] but nothing is written; the
    /// batches that would be persisted are returned instead.
    pub async fn preview_pdf<S: ExpenseStore>(
        &self,
        store: &mut S,
        user_id: &str,
        default_category_id: &str,
        source: ImportSource,
    ) -> Result<PreviewResult, ImportError> {
        let (summary, batches) = self
            .run(store, user_id, default_category_id, source, RunMode::Preview)
            .await?;
        Ok(PreviewResult { summary, batches })
    }

    async fn run<S: ExpenseStore>(
        &self,
        store: &mut S,
        user_id: &str,
        default_category_id: &str,
        source: ImportSource,
        mode: RunMode,
    ) -> Result<(ImportSummary, Vec<ImportBatch>), ImportError> {
        match store.get_user(user_id) {
            Ok(Some(user)) if user.active => {}
            Ok(Some(_)) => return Err(ImportError::InactiveUser(user_id.to_string())),
            Ok(None) => return Err(ImportError::UnknownUser(user_id.to_string())),
            Err(e) => return Err(ImportError::UserLookup(e)),
        }

        // Each document is (path to process, name recorded in reports)
        let (documents, staged) = match source {
            ImportSource::Path(root) => {
                let documents = locate_documents(&root)
                    .map(|found| found.map(|path| {
                        let name = path.to_string_lossy().to_string();
                        (path, name)
                    }))
                    .collect::<Result<Vec<_>, _>>()?;
                (documents, None)
            }
            ImportSource::Upload { file_name, bytes } => {
                let staged = stage_upload(&self.scratch_root, &file_name, &bytes)?;
                // The staging directory is gone once the call returns
                let name = staged
                    .path()
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or(file_name);
                (vec![(staged.path().to_path_buf(), name)], Some(staged))
            }
        };
        log::info!("PDF Import: Found {} documents", documents.len());

        let mut summary = ImportSummary::default();
        let mut batches = Vec::new();
        for (path, source_file) in &documents {
            let (report, batch) = self
                .process_document(store, path, source_file, user_id, default_category_id, mode)
                .await;
            summary.record(report);
            batches.extend(batch);
        }

        if let Some(staged) = staged {
            if let Err(e) = staged.cleanup() {
                log::warn!("PDF Import: Failed to remove staged upload: {}", e);
            }
        }

        log::info!(
            "PDF Import: {} documents ({} failed), {} candidates, {} dropped, {} expenses persisted",
            summary.documents_processed,
            summary.documents_failed,
            summary.candidates_matched,
            summary.total_dropped(),
            summary.expenses_persisted
        );
        Ok((summary, batches))
    }

    /// Run one document and clean up its scratch directory, whatever happened
    async fn process_document<S: ExpenseStore>(
        &self,
        store: &mut S,
        path: &Path,
        source_file: &str,
        user_id: &str,
        default_category_id: &str,
        mode: RunMode,
    ) -> (DocumentReport, Option<ImportBatch>) {
        log::info!("PDF Import: Processing {}", path.display());
        let mut run = DocumentRun::new(source_file);

        let scratch = match ScratchDir::create_in(&self.scratch_root, "doc-") {
            Ok(scratch) => scratch,
            Err(e) => {
                let error = DocumentError::Rasterization(format!(
                    "cannot create scratch directory in {}: {}",
                    self.scratch_root.display(),
                    e
                ));
                log::error!("PDF Import: {} failed: {}", path.display(), error);
                let outcome = DocumentOutcome::Failed {
                    stage: run.stage,
                    error: error.to_string(),
                };
                return (run.into_report(outcome, None), None);
            }
        };

        let result = self
            .run_stages(store, path, &scratch, &mut run, user_id, default_category_id, mode)
            .await;

        let cleanup_error = match scratch.cleanup() {
            Ok(()) => None,
            Err(e) => {
                log::warn!("PDF Import: {}", e);
                Some(e.to_string())
            }
        };

        match result {
            Ok(batch) => {
                log::info!(
                    "PDF Import: Done with {} ({} expenses)",
                    path.display(),
                    batch.records.len()
                );
                (run.into_report(DocumentOutcome::Done, cleanup_error), Some(batch))
            }
            Err(error) => {
                log::error!(
                    "PDF Import: {} failed after stage {:?}: {}",
                    path.display(),
                    run.stage,
                    error
                );
                let outcome = DocumentOutcome::Failed {
                    stage: run.stage,
                    error: error.to_string(),
                };
                (run.into_report(outcome, cleanup_error), None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stages<S: ExpenseStore>(
        &self,
        store: &mut S,
        path: &Path,
        scratch: &ScratchDir,
        run: &mut DocumentRun,
        user_id: &str,
        default_category_id: &str,
        mode: RunMode,
    ) -> Result<ImportBatch, DocumentError> {
        // Rendering and OCR are the slow stages; the timeout drops their
        // futures, which kills any running subprocess.
        let text = tokio::time::timeout(self.document_timeout, self.read_document(path, scratch, run))
            .await
            .map_err(|_| DocumentError::Timeout(self.document_timeout))??;

        let candidates = self.grammar.find_candidates(&text)?;
        run.candidates_matched = candidates.len();

        let parsed = self.normalize_candidates(candidates);
        run.count_drops(&parsed.dropped);
        run.stage = DocumentStage::Parsed;

        let validated = self.validate_transactions(parsed.kept, user_id, default_category_id);
        run.count_drops(&validated.dropped);
        run.expenses_validated = validated.kept.len();
        run.stage = DocumentStage::Validated;

        let batch = ImportBatch {
            user_id: user_id.to_string(),
            source_file: run.source_file.clone(),
            records: validated.kept,
        };

        if mode == RunMode::Persist {
            run.expenses_persisted = store
                .create_expenses(&batch)
                .map_err(|e| DocumentError::Persistence(format!("{:#}", e)))?;
            run.stage = DocumentStage::Persisted;
        }

        Ok(batch)
    }

    async fn read_document(
        &self,
        path: &Path,
        scratch: &ScratchDir,
        run: &mut DocumentRun,
    ) -> Result<String, DocumentError> {
        let pages_dir = scratch.pages_dir();

        let pages = self.rasterizer.rasterize(path, &pages_dir).await?;
        run.pages = pages.len();
        run.stage = DocumentStage::Rasterized;

        let ocr = extract_text(&self.ocr, &pages_dir).await?;
        run.stage = DocumentStage::Extracted;

        Ok(ocr.full_text)
    }

    fn normalize_candidates(&self, candidates: Vec<CandidateMatch>) -> Fold<NormalizedTransaction> {
        candidates.iter().fold(Fold::new(), |mut fold, candidate| {
            match self.normalizer.normalize(candidate) {
                Ok(tx) => fold.kept.push(tx),
                Err(e) => fold.dropped.push(DropReason::from(e)),
            }
            fold
        })
    }

    fn validate_transactions(
        &self,
        transactions: Vec<NormalizedTransaction>,
        user_id: &str,
        category_id: &str,
    ) -> Fold<ExpenseRecord> {
        transactions.into_iter().fold(Fold::new(), |mut fold, tx| {
            match ExpenseRecord::new(tx, user_id, category_id, self.notes_overflow) {
                Ok(record) => fold.kept.push(record),
                Err(e) => fold.dropped.push(DropReason::from(e)),
            }
            fold
        })
    }
}
