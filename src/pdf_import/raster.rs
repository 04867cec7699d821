//! PDF page rasterization
//!
//! Renders every page of a statement into `image-00000.png`,
//! `image-00001.png`, ... so that file name order equals page order.

use super::error::DocumentError;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// One rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterPage {
    pub index: usize,
    pub path: PathBuf,
}

/// Renders a PDF into one image per page
#[allow(async_fn_in_trait)]
pub trait Rasterizer {
    /// Render all pages of `pdf_path` into `output_dir`, creating it if absent.
    ///
    /// Pages rendered before a failure are left in place for cleanup.
    async fn rasterize(&self, pdf_path: &Path, output_dir: &Path)
        -> Result<Vec<RasterPage>, DocumentError>;
}

/// Zero-padded image name for a 0-based page index
pub fn page_file_name(index: usize) -> String {
    format!("image-{:05}.png", index)
}

/// Rasterizer backed by poppler-utils (`pdfinfo` + `pdftoppm`)
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    pub pdftoppm: String,
    pub pdfinfo: String,
    pub dpi: u32,
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self {
            pdftoppm: "pdftoppm".to_string(),
            pdfinfo: "pdfinfo".to_string(),
            dpi: 150, // 150 DPI is sufficient for OCR
        }
    }
}

impl PopplerRasterizer {
    async fn page_count(&self, pdf_path: &Path) -> Result<usize, DocumentError> {
        let output = Command::new(&self.pdfinfo)
            .arg(pdf_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DocumentError::Rasterization(format!(
                    "{} could not be run (install poppler-utils): {}",
                    self.pdfinfo, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocumentError::Rasterization(format!(
                "cannot open {}: {}",
                pdf_path.display(),
                stderr.trim()
            )));
        }

        match parse_page_count(&String::from_utf8_lossy(&output.stdout)) {
            Some(0) | None => Err(DocumentError::Rasterization(format!(
                "{} has no pages",
                pdf_path.display()
            ))),
            Some(count) => Ok(count),
        }
    }

    async fn render_page(
        &self,
        pdf_path: &Path,
        output_dir: &Path,
        index: usize,
    ) -> Result<RasterPage, DocumentError> {
        let page_number = (index + 1).to_string();
        let target = output_dir.join(page_file_name(index));
        // -singlefile appends only the extension to the output root
        let output_root = target.with_extension("");

        let output = Command::new(&self.pdftoppm)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg(&page_number)
            .arg("-l")
            .arg(&page_number)
            .arg("-singlefile")
            .arg(pdf_path)
            .arg(&output_root)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DocumentError::Rasterization(format!(
                    "{} could not be run (install poppler-utils): {}",
                    self.pdftoppm, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocumentError::Rasterization(format!(
                "page {} could not be rendered: {}",
                page_number,
                stderr.trim()
            )));
        }
        if !target.exists() {
            return Err(DocumentError::Rasterization(format!(
                "{} produced no image for page {}",
                self.pdftoppm, page_number
            )));
        }

        Ok(RasterPage {
            index,
            path: target,
        })
    }
}

impl Rasterizer for PopplerRasterizer {
    async fn rasterize(
        &self,
        pdf_path: &Path,
        output_dir: &Path,
    ) -> Result<Vec<RasterPage>, DocumentError> {
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            DocumentError::Rasterization(format!(
                "cannot create {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        let total_pages = self.page_count(pdf_path).await?;
        log::info!("OCR: Rendering {} pages at {} DPI", total_pages, self.dpi);

        let mut pages = Vec::with_capacity(total_pages);
        for index in 0..total_pages {
            log::debug!("OCR: Rendering page {}/{}", index + 1, total_pages);
            pages.push(self.render_page(pdf_path, output_dir, index).await?);
        }

        Ok(pages)
    }
}

/// Read the `Pages:` line of `pdfinfo` output
pub fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

/// Check whether an external tool can be started
pub async fn is_tool_available(command: &str, version_arg: &str) -> bool {
    Command::new(command)
        .arg(version_arg)
        .kill_on_drop(true)
        .output()
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_file_name() {
        assert_eq!(page_file_name(0), "image-00000.png");
        assert_eq!(page_file_name(12), "image-00012.png");
        assert!(page_file_name(9) < page_file_name(10));
    }

    #[test]
    fn test_parse_page_count() {
        let info = "Title:          Fatura\n\
                    Producer:       Bank\n\
                    Pages:          3\n\
                    Encrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(3));
        assert_eq!(parse_page_count("Title: x\n"), None);
        assert_eq!(parse_page_count("Pages: many\n"), None);
    }

    #[tokio::test]
    async fn test_missing_tool_is_rasterization_error() {
        let scratch = tempfile::tempdir().unwrap();
        let output_dir = scratch.path().join("pages");
        let rasterizer = PopplerRasterizer {
            pdftoppm: "statement-import-missing-pdftoppm".to_string(),
            pdfinfo: "statement-import-missing-pdfinfo".to_string(),
            dpi: 150,
        };

        let result = rasterizer
            .rasterize(Path::new("/nonexistent/fatura.pdf"), &output_dir)
            .await;

        assert!(matches!(result, Err(DocumentError::Rasterization(_))));
        assert!(output_dir.is_dir());
    }

    #[tokio::test]
    async fn test_is_tool_available() {
        assert!(!is_tool_available("statement-import-missing-tool", "--version").await);
    }
}
