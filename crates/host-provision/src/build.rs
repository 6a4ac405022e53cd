//! Build orchestration: shallow clone, package, verify.

use std::path::PathBuf;

use tracing::info;

use crate::command::{Cmd, Host};
use crate::error::{BuildError, ProvisionError, Result};
use crate::workspace::BuildWorkspace;

/// What to build and what the build must leave behind.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub repo_url: String,
    /// Branch or tag; `None` builds the remote's default branch.
    pub repo_ref: Option<String>,
    /// Artifact path relative to the source root.
    pub artifact: PathBuf,
    /// Service unit template relative to the source root.
    pub unit_template: PathBuf,
}

/// A verified build. Holding it keeps the workspace alive.
#[derive(Debug)]
pub struct BuildOutput {
    pub artifact: PathBuf,
    pub unit_template: PathBuf,
    pub workspace: BuildWorkspace,
}

/// Build in a freshly acquired workspace.
pub fn build(host: &dyn Host, req: &BuildRequest) -> Result<BuildOutput> {
    let workspace = BuildWorkspace::acquire()?;
    build_in(host, req, workspace)
}

/// Build inside `workspace`. On any error the workspace is dropped, and with
/// it the directory tree.
pub fn build_in(host: &dyn Host, req: &BuildRequest, workspace: BuildWorkspace) -> Result<BuildOutput> {
    let src = workspace.path().join("src");

    let mut clone = Cmd::new("git").args(["clone", "--depth", "1"]);
    if let Some(r) = &req.repo_ref {
        clone = clone.args(["--branch", r.as_str()]);
    }
    let clone = clone.arg(req.repo_url.as_str()).arg_path(&src);

    info!("Cloning {}", req.repo_url);
    let out = host
        .run(&clone)
        .map_err(|e| ProvisionError::io("could not run git", e))?;
    if !out.success() {
        return Err(BuildError::Clone {
            url: req.repo_url.clone(),
            reason: out.failure_reason(),
        }
        .into());
    }

    info!("Building (tests skipped)");
    let package = Cmd::new("mvn").args(["-B", "package", "-DskipTests"]).dir(&src);
    let out = host
        .run(&package)
        .map_err(|e| ProvisionError::io("could not run mvn", e))?;
    if !out.success() {
        return Err(BuildError::Compile(out.failure_reason()).into());
    }

    let artifact = src.join(&req.artifact);
    if !artifact.is_file() {
        return Err(BuildError::MissingArtifact(artifact).into());
    }
    let unit_template = src.join(&req.unit_template);
    if !unit_template.is_file() {
        return Err(BuildError::MissingUnitTemplate(unit_template).into());
    }
    info!("Built {}", artifact.display());

    Ok(BuildOutput {
        artifact,
        unit_template,
        workspace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Cmd;
    use crate::testing::{fail, ok, RecordingHost};
    use std::path::Path;

    fn request() -> BuildRequest {
        BuildRequest {
            repo_url: "https://example.invalid/socks-lb.git".into(),
            repo_ref: None,
            artifact: PathBuf::from("target/socks-lb.jar"),
            unit_template: PathBuf::from("socks-lb.service"),
        }
    }

    /// Simulate a clone that lays down the unit template and a build that
    /// writes the jar.
    fn working_host() -> RecordingHost {
        let host = RecordingHost::new();
        host.on("git clone", |_, cmd: &Cmd| {
            let dest = Path::new(cmd.get_args().last().unwrap());
            std::fs::create_dir_all(dest).unwrap();
            std::fs::write(dest.join("socks-lb.service"), "[Unit]\n").unwrap();
            ok()
        })
        .on("mvn", |_, cmd: &Cmd| {
            let target = cmd.get_dir().unwrap().join("target");
            std::fs::create_dir_all(&target).unwrap();
            std::fs::write(target.join("socks-lb.jar"), b"PK").unwrap();
            ok()
        });
        host
    }

    #[test]
    fn test_build_success() {
        let parent = tempfile::tempdir().unwrap();
        let host = working_host();
        let ws = BuildWorkspace::acquire_in(parent.path()).unwrap();
        let ws_path = ws.path().to_path_buf();

        let out = build_in(&host, &request(), ws).unwrap();

        assert_eq!(out.artifact, ws_path.join("src/target/socks-lb.jar"));
        assert!(out.unit_template.is_file());
        let cmds = host.commands();
        assert!(cmds[0].starts_with("git clone --depth 1 https://example.invalid/socks-lb.git "));
        assert_eq!(cmds[1], "mvn -B package -DskipTests");

        out.workspace.release();
        assert!(!ws_path.exists());
    }

    #[test]
    fn test_build_with_ref() {
        let parent = tempfile::tempdir().unwrap();
        let host = working_host();
        let mut req = request();
        req.repo_ref = Some("v2.1.0".into());
        let ws = BuildWorkspace::acquire_in(parent.path()).unwrap();
        build_in(&host, &req, ws).unwrap();
        assert!(host.ran("git clone --depth 1 --branch v2.1.0 https://example.invalid/"));
    }

    #[test]
    fn test_missing_artifact_after_success() {
        let parent = tempfile::tempdir().unwrap();
        let host = working_host();
        // Build "succeeds" without producing anything.
        host.on("mvn", |_, _| ok());
        let ws = BuildWorkspace::acquire_in(parent.path()).unwrap();
        let ws_path = ws.path().to_path_buf();

        let err = build_in(&host, &request(), ws).unwrap_err();

        assert!(matches!(err, ProvisionError::Build(BuildError::MissingArtifact(_))));
        assert!(!ws_path.exists());
    }

    #[test]
    fn test_missing_unit_template() {
        let parent = tempfile::tempdir().unwrap();
        let host = working_host();
        host.on("git clone", |_, cmd: &Cmd| {
            std::fs::create_dir_all(cmd.get_args().last().unwrap()).unwrap();
            ok()
        });
        let ws = BuildWorkspace::acquire_in(parent.path()).unwrap();
        let err = build_in(&host, &request(), ws).unwrap_err();
        assert!(matches!(err, ProvisionError::Build(BuildError::MissingUnitTemplate(_))));
    }

    #[test]
    fn test_clone_failure_skips_build() {
        let parent = tempfile::tempdir().unwrap();
        let host = RecordingHost::new();
        host.on("git clone", |_, _| fail(128, "fatal: repository not found"));
        let ws = BuildWorkspace::acquire_in(parent.path()).unwrap();
        let ws_path = ws.path().to_path_buf();

        let err = build_in(&host, &request(), ws).unwrap_err();

        match err {
            ProvisionError::Build(BuildError::Clone { reason, .. }) => {
                assert!(reason.contains("repository not found"))
            }
            other => panic!("expected clone error, got {:?}", other),
        }
        assert!(!host.ran("mvn"));
        assert!(!ws_path.exists());
    }

    #[test]
    fn test_compile_failure() {
        let parent = tempfile::tempdir().unwrap();
        let host = working_host();
        host.on("mvn", |_, _| fail(1, "[ERROR] COMPILATION ERROR"));
        let ws = BuildWorkspace::acquire_in(parent.path()).unwrap();
        let err = build_in(&host, &request(), ws).unwrap_err();
        assert!(matches!(err, ProvisionError::Build(BuildError::Compile(_))));
    }

    #[test]
    fn test_interrupted_build_removes_workspace() {
        let parent = tempfile::tempdir().unwrap();
        let host = working_host();
        host.interrupt("mvn");
        let ws = BuildWorkspace::acquire_in(parent.path()).unwrap();
        let ws_path = ws.path().to_path_buf();

        let err = build_in(&host, &request(), ws).unwrap_err();

        assert!(matches!(err, ProvisionError::Interrupted), "got {:?}", err);
        assert!(!ws_path.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
