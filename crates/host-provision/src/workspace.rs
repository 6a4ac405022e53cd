//! The ephemeral build workspace.
//!
//! Removal is tied to the guard: it happens exactly once, either through
//! [`BuildWorkspace::release`] or when the guard is dropped on an error path.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::BuildError;

const PREFIX: &str = "socks-lb-build.";

#[derive(Debug)]
pub struct BuildWorkspace {
    dir: TempDir,
}

impl BuildWorkspace {
    /// Create a fresh directory under the system temp dir.
    pub fn acquire() -> Result<Self, BuildError> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir()
            .map_err(BuildError::Workspace)?;
        debug!("build workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Like [`acquire`](Self::acquire), rooted at `parent`.
    pub fn acquire_in(parent: &Path) -> Result<Self, BuildError> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(parent)
            .map_err(BuildError::Workspace)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the workspace now, logging the outcome.
    pub fn release(self) {
        let path: PathBuf = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => info!("Removed build workspace {}", path.display()),
            Err(e) => warn!("Could not remove build workspace {}: {}", path.display(), e),
        }
    }
}
