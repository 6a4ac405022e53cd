pub mod build;
pub mod command;
pub mod deps;
pub mod detect;
pub mod error;
pub mod pkg;
pub mod privilege;
pub mod signal;
pub mod workspace;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use build::{build, BuildOutput, BuildRequest};
pub use command::{Cmd, CmdOutput, Host, SystemHost};
pub use deps::{Dependency, Resolution, Resolver};
pub use detect::{detect, Environment};
pub use error::{BuildError, ProvisionError};
pub use pkg::PackageManager;
pub use workspace::BuildWorkspace;
