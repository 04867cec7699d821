//! Statement discovery
//!
//! Finds PDF files under a directory (or accepts a single file) without
//! opening them, and stages uploaded files for processing.

use super::error::DiscoveryError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// PDF magic bytes
const PDF_MAGIC: &[u8] = b"%PDF";
/// Maximum uploaded PDF size (100 MB)
pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Lazily enumerate absolute paths of PDF files under `root`.
///
/// Entries are visited in file name order. Nothing matching is an empty
/// sequence; only I/O failures while walking are errors.
pub fn locate_documents(root: &Path) -> impl Iterator<Item = Result<PathBuf, DiscoveryError>> {
    let root = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(root))
            .unwrap_or_else(|_| root.to_path_buf())
    };

    WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() && is_pdf(entry.path()) => {
                Some(Ok(entry.into_path()))
            }
            Ok(_) => None,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                Some(Err(DiscoveryError::Walk {
                    path,
                    message: e.to_string(),
                }))
            }
        })
}

/// Check an uploaded file before it is written anywhere
pub fn validate_upload(file_name: &str, bytes: &[u8]) -> Result<(), DiscoveryError> {
    let reject = |reason: String| DiscoveryError::InvalidUpload {
        file_name: file_name.to_string(),
        reason,
    };

    if bytes.len() < 8 {
        return Err(reject("file too small to be a PDF".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_SIZE {
        return Err(reject(format!(
            "file too large ({} MB, maximum {} MB)",
            bytes.len() / (1024 * 1024),
            MAX_UPLOAD_SIZE / (1024 * 1024)
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(reject("missing PDF header".to_string()));
    }

    Ok(())
}

/// An uploaded PDF written to a staging directory.
///
/// The staging directory is removed when this value is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    dir: TempDir,
    path: PathBuf,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cleanup(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// Validate an upload and write it under `scratch_root`
pub fn stage_upload(
    scratch_root: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<StagedUpload, DiscoveryError> {
    validate_upload(file_name, bytes)?;

    let staging_err = |source| DiscoveryError::Staging {
        file_name: file_name.to_string(),
        source,
    };

    std::fs::create_dir_all(scratch_root).map_err(staging_err)?;
    let dir = tempfile::Builder::new()
        .prefix("upload-")
        .tempdir_in(scratch_root)
        .map_err(staging_err)?;

    // Only keep the final path component of client-supplied names
    let safe_name = Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| is_pdf(Path::new(name)))
        .unwrap_or_else(|| "upload.pdf".to_string());

    let path = dir.path().join(safe_name);
    std::fs::write(&path, bytes).map_err(staging_err)?;

    Ok(StagedUpload { dir, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn test_locate_documents_in_tree() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("b.pdf"));
        touch(&root.path().join("a.PDF"));
        touch(&root.path().join("notes.txt"));
        touch(&root.path().join("2024").join("mar.pdf"));

        let found: Vec<PathBuf> = locate_documents(root.path())
            .collect::<Result<_, _>>()
            .unwrap();

        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(root.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["2024/mar.pdf", "a.PDF", "b.pdf"]);
        assert!(found.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_locate_single_file() {
        let root = tempfile::tempdir().unwrap();
        let pdf = root.path().join("fatura.pdf");
        let txt = root.path().join("fatura.txt");
        touch(&pdf);
        touch(&txt);

        let found: Vec<_> = locate_documents(&pdf).collect::<Result<_, _>>().unwrap();
        assert_eq!(found, vec![pdf]);
        assert_eq!(locate_documents(&txt).count(), 0);
    }

    #[test]
    fn test_empty_dir_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(locate_documents(root.path()).count(), 0);
    }

    #[test]
    fn test_missing_root_is_discovery_error() {
        let root = tempfile::tempdir().unwrap();
        let results: Vec<_> = locate_documents(&root.path().join("missing")).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DiscoveryError::Walk { .. })));
    }

    #[test]
    fn test_validate_upload() {
        assert!(validate_upload("a.pdf", b"%PDF-1.7\n...").is_ok());
        assert!(matches!(
            validate_upload("a.pdf", b"%PDF"),
            Err(DiscoveryError::InvalidUpload { .. })
        ));
        assert!(matches!(
            validate_upload("a.pdf", b"PK\x03\x04zipfile"),
            Err(DiscoveryError::InvalidUpload { .. })
        ));
    }

    #[test]
    fn test_stage_upload_sanitizes_name() {
        let root = tempfile::tempdir().unwrap();
        let staged = stage_upload(root.path(), "../../etc/fatura.pdf", b"%PDF-1.7 body").unwrap();

        assert_eq!(staged.path().file_name().unwrap(), "fatura.pdf");
        assert!(staged.path().starts_with(root.path()));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"%PDF-1.7 body");

        let dir = staged.path().parent().unwrap().to_path_buf();
        staged.cleanup().unwrap();
        assert!(!dir.exists());
    }
}
