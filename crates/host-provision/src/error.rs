//! Error taxonomy for host provisioning.
//!
//! Every variant is fatal to an install run. Best-effort teardown steps log
//! their failures instead of constructing one of these.

use std::path::PathBuf;

/// A fatal provisioning failure.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("this operation must be run as root (effective uid is {euid}); re-run with sudo")]
    Privilege { euid: u32 },

    #[error("unsupported host: {0}")]
    Environment(String),

    #[error("dependency `{name}` could not be satisfied: {reason}")]
    Dependency { name: String, reason: String },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("service registration failed: {0}")]
    Service(String),

    #[error("interrupted by signal")]
    Interrupted,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the clone/build/verify sequence.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("could not allocate build workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("cloning {url} failed: {reason}")]
    Clone { url: String, reason: String },

    #[error("build failed: {0}")]
    Compile(String),

    /// The build tool reported success but the artifact is not where it
    /// should be.
    #[error("build reported success but artifact {} does not exist", .0.display())]
    MissingArtifact(PathBuf),

    #[error("source tree does not ship the service unit {}", .0.display())]
    MissingUnitTemplate(PathBuf),
}

impl ProvisionError {
    pub fn dependency(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dependency {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::Interrupted {
            return Self::Interrupted;
        }
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;
