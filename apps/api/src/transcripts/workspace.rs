//! Request-scoped scratch directories.
//!
//! A `RequestWorkspace` owns a uniquely-named directory under the configured
//! scratch root. Dropping it deletes the directory and everything in it, so
//! uploads never outlive their request, whichever way the handler exits.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

pub(crate) const WORKSPACE_PREFIX: &str = "transcript-req-";

#[derive(Debug)]
pub struct RequestWorkspace {
    dir: TempDir,
}

impl RequestWorkspace {
    pub fn create_in(root: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        debug!("Created request workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location for a file inside the workspace. `name` must already be sanitized.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Removes the workspace now, logging instead of failing the request.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed request workspace {}", path.display()),
            Err(e) => warn!("Failed to remove request workspace {}: {e}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn test_close_removes_files() {
        let root = tempfile::tempdir().unwrap();
        let workspace = RequestWorkspace::create_in(root.path()).unwrap();
        std::fs::write(workspace.file_path("upload.txt"), b"hello").unwrap();
        assert_eq!(entries(root.path()), 1);

        workspace.close();
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_drop_removes_files() {
        let root = tempfile::tempdir().unwrap();
        {
            let workspace = RequestWorkspace::create_in(root.path()).unwrap();
            std::fs::write(workspace.file_path("upload.docx"), b"PK").unwrap();
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_panic_unwinding_removes_files() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let workspace = RequestWorkspace::create_in(&root_path).unwrap();
            std::fs::write(workspace.file_path("upload.txt"), b"x").unwrap();
            panic!("handler blew up");
        });
        assert!(result.is_err());
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_creates_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let workspace = RequestWorkspace::create_in(&nested).unwrap();
        assert!(workspace.path().starts_with(&nested));
    }
}
