//! Document-scoped scratch directories

use super::error::CleanupError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Working directory for one document's rendered pages.
///
/// [`ScratchDir::cleanup`] removes it and reports failures. If a run ends
/// without calling it, dropping the guard still removes the directory.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, creating `root` if needed
    pub fn create_in(root: &Path, prefix: &str) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory the rasterizer writes page images into
    pub fn pages_dir(&self) -> PathBuf {
        self.dir.path().join("pages")
    }

    /// Recursively remove the directory
    pub fn cleanup(self) -> Result<(), CleanupError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|source| CleanupError { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_removes_populated_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create_in(&root.path().join("scratch"), "doc-").unwrap();
        let pages = scratch.pages_dir();
        std::fs::create_dir_all(&pages).unwrap();
        std::fs::write(pages.join("image-00000.png"), b"png").unwrap();

        let path = scratch.path().to_path_buf();
        assert!(path.starts_with(root.path()));
        scratch.cleanup().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_dir() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create_in(root.path(), "doc-").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_reports_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create_in(root.path(), "doc-").unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::remove_dir_all(&path).unwrap();

        let err = scratch.cleanup().unwrap_err();
        assert_eq!(err.path, path);
    }
}
