//! OCR text extraction for rasterized statements
//!
//! Runs an OCR engine over the page images of a scratch directory in file
//! name order and joins the recognized text, one page per block.

use super::error::DocumentError;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// OCR result for a single page
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub page_number: usize,
    pub text: String,
}

/// OCR result for entire document
#[derive(Debug, Clone, Default)]
pub struct OcrResult {
    pub pages: Vec<OcrPageResult>,
    pub full_text: String,
}

/// Recognizes text in one page image
#[allow(async_fn_in_trait)]
pub trait OcrEngine {
    /// Make sure the engine can run at all; called once per document
    async fn initialize(&self) -> Result<(), String>;

    /// Recognize the text of one image. Empty text is a valid result.
    async fn recognize(&self, image_path: &Path) -> Result<String, String>;
}

/// OCR engine backed by the `tesseract` command line tool
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    pub command: String,
    pub language: String,
    pub page_seg_mode: u32,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: "por".to_string(),
            page_seg_mode: 3, // Fully automatic page segmentation, no OSD
        }
    }
}

impl OcrEngine for TesseractEngine {
    async fn initialize(&self) -> Result<(), String> {
        let output = Command::new(&self.command)
            .arg("--list-langs")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("{} could not be run (install tesseract-ocr): {}", self.command, e))?;

        if !output.status.success() {
            return Err(format!(
                "{} --list-langs failed: {}",
                self.command,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        // Some versions print the language list on stderr
        let listing = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        // "por+eng" asks for several models at once; each must be installed
        let installed: Vec<&str> = listing.lines().map(str::trim).collect();
        let missing: Vec<&str> = self
            .language
            .split('+')
            .map(str::trim)
            .filter(|lang| !installed.contains(lang))
            .collect();
        if !missing.is_empty() {
            return Err(format!(
                "tesseract language data '{}' is not installed",
                missing.join("+")
            ));
        }

        Ok(())
    }

    async fn recognize(&self, image_path: &Path) -> Result<String, String> {
        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_seg_mode.to_string())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("{} could not be run: {}", self.command, e))?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Page images of a scratch directory, sorted by file name
pub fn list_page_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut image_paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "png").unwrap_or(false))
        .collect();

    // Sort by filename to maintain page order
    image_paths.sort();
    Ok(image_paths)
}

/// OCR every page image in `pages_dir`, appending each page's text and a
/// newline in page order.
pub async fn extract_text<E: OcrEngine>(
    engine: &E,
    pages_dir: &Path,
) -> Result<OcrResult, DocumentError> {
    engine
        .initialize()
        .await
        .map_err(|e| DocumentError::Extraction(format!("OCR engine unavailable: {}", e)))?;

    let image_paths = list_page_images(pages_dir).map_err(|e| {
        DocumentError::Extraction(format!("cannot read {}: {}", pages_dir.display(), e))
    })?;
    let total_pages = image_paths.len();

    let mut result = OcrResult::default();
    for (i, image_path) in image_paths.iter().enumerate() {
        let page_number = i + 1;
        log::debug!("OCR: Processing page {}/{}", page_number, total_pages);

        let text = engine.recognize(image_path).await.map_err(|e| {
            DocumentError::Extraction(format!("OCR failed for page {}: {}", page_number, e))
        })?;

        if text.trim().is_empty() {
            log::debug!("OCR: Page {} produced no text", page_number);
        }

        result.full_text.push_str(&text);
        result.full_text.push('\n');
        result.pages.push(OcrPageResult { page_number, text });
    }

    log::info!(
        "OCR: Extracted {} chars from {} pages",
        result.full_text.len(),
        total_pages
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Returns canned text per image file name
    struct CannedEngine {
        pages: HashMap<String, Result<String, String>>,
        available: bool,
    }

    impl OcrEngine for CannedEngine {
        async fn initialize(&self) -> Result<(), String> {
            if self.available {
                Ok(())
            } else {
                Err("no engine".to_string())
            }
        }

        async fn recognize(&self, image_path: &Path) -> Result<String, String> {
            let name = image_path.file_name().unwrap().to_string_lossy().to_string();
            self.pages.get(&name).cloned().unwrap_or(Ok(String::new()))
        }
    }

    fn pages_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"png").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_extract_text_in_page_order() {
        // Created out of order on purpose
        let dir = pages_dir(&["image-00002.png", "image-00000.png", "notes.txt", "image-00001.png"]);
        let engine = CannedEngine {
            pages: HashMap::from([
                ("image-00000.png".to_string(), Ok("first".to_string())),
                ("image-00001.png".to_string(), Ok(String::new())),
                ("image-00002.png".to_string(), Ok("third".to_string())),
            ]),
            available: true,
        };

        let result = extract_text(&engine, dir.path()).await.unwrap();
        assert_eq!(result.full_text, "first\n\nthird\n");
        assert_eq!(result.pages.len(), 3);
        assert_eq!(result.pages[2].page_number, 3);
    }

    #[tokio::test]
    async fn test_engine_unavailable() {
        let dir = pages_dir(&["image-00000.png"]);
        let engine = CannedEngine {
            pages: HashMap::new(),
            available: false,
        };

        let err = extract_text(&engine, dir.path()).await.unwrap_err();
        assert!(matches!(err, DocumentError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_page_error_is_fatal() {
        let dir = pages_dir(&["image-00000.png", "image-00001.png"]);
        let engine = CannedEngine {
            pages: HashMap::from([("image-00001.png".to_string(), Err("bad image".to_string()))]),
            available: true,
        };

        let err = extract_text(&engine, dir.path()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "text extraction failed: OCR failed for page 2: bad image"
        );
    }

    /// Executable script standing in for `tesseract --list-langs`
    #[cfg(unix)]
    fn fake_tesseract(dir: &Path, languages: &[&str]) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("tesseract");
        let body = format!(
            "#!/bin/sh\necho 'List of available languages in \"/usr/share/tessdata/\" ({}):'\nprintf '{}\\n'\n",
            languages.len(),
            languages.join("\\n")
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_initialize_checks_every_requested_language() {
        let dir = tempfile::tempdir().unwrap();
        let command = fake_tesseract(dir.path(), &["eng", "osd", "por"]);
        let engine = |language: &str| TesseractEngine {
            command: command.clone(),
            language: language.to_string(),
            ..TesseractEngine::default()
        };

        assert!(engine("por").initialize().await.is_ok());
        assert!(engine("por+eng").initialize().await.is_ok());

        let err = engine("por+deu").initialize().await.unwrap_err();
        assert_eq!(err, "tesseract language data 'deu' is not installed");
        assert!(engine("spa").initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_tesseract() {
        let engine = TesseractEngine {
            command: "statement-import-missing-tesseract".to_string(),
            ..TesseractEngine::default()
        };
        assert!(engine.initialize().await.is_err());
    }
}
