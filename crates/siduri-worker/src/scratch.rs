//! Per-invocation scratch directories.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{WorkerError, WorkerResult};

/// A uniquely named working directory owned by one invocation.
///
/// Removed on [`ScratchSpace::close`], or on drop if the invocation unwinds
/// or is cancelled before reaching it.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh directory under `work_dir`.
    pub fn create(work_dir: &Path) -> WorkerResult<Self> {
        std::fs::create_dir_all(work_dir).map_err(|e| {
            WorkerError::scratch(format!("cannot create {}: {}", work_dir.display(), e))
        })?;
        let dir = tempfile::Builder::new()
            .prefix("invocation-")
            .tempdir_in(work_dir)
            .map_err(|e| WorkerError::scratch(format!("cannot create scratch dir: {}", e)))?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory and everything in it.
    ///
    /// A removal failure is logged, never raised, so it cannot mask the
    /// invocation's own result.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed scratch directory"),
            Err(e) => warn!(path = %path.display(), "Failed to remove scratch directory: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_removes_contents() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::create(&root.path().join("work")).unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(scratch.file("source.mp4"), b"data").unwrap();

        scratch.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchSpace::create(root.path()).unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_directories_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchSpace::create(root.path()).unwrap();
        let b = ScratchSpace::create(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
