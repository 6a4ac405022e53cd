//! Install settings, fixed paths and the service identity.
//!
//! Everything here is built once in `main` and passed down by reference;
//! nothing below the front controller reads the process environment.

use std::path::{Path, PathBuf};

use host_provision::BuildRequest;

use crate::cli::Cli;

pub const SERVICE_NAME: &str = "socks-lb";

/// Operator-tunable values for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub listen_host: String,
    pub listen_port: u16,
    pub upstream_port: u16,
    pub repo_url: String,
    pub repo_ref: Option<String>,
    pub regenerate_config: bool,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            listen_host: cli.listen_host.clone(),
            listen_port: cli.listen_port,
            upstream_port: cli.upstream_port,
            repo_url: cli.repo_url.clone(),
            repo_ref: cli.repo_ref.clone(),
            regenerate_config: cli.regenerate_config,
        }
    }

    pub fn build_request(&self, layout: &Layout) -> BuildRequest {
        BuildRequest {
            repo_url: self.repo_url.clone(),
            repo_ref: self.repo_ref.clone(),
            artifact: Path::new("target").join(&layout.artifact_name),
            unit_template: PathBuf::from(&layout.unit_name),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".into(),
            listen_port: 1080,
            upstream_port: 9080,
            repo_url: crate::cli::DEFAULT_REPO_URL.into(),
            repo_ref: None,
            regenerate_config: false,
        }
    }
}

/// Where the installed service lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub install_dir: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub unit_dir: PathBuf,
    pub artifact_name: String,
    pub config_name: String,
    pub unit_name: String,
}

/// Mode of the install, config and log directories.
pub const DIR_MODE: u32 = 0o750;
/// Mode of the generated config file.
pub const CONFIG_MODE: u32 = 0o640;

impl Layout {
    pub fn standard() -> Self {
        Self::rooted(Path::new("/"))
    }

    /// The standard layout re-rooted under `root`.
    pub fn rooted(root: &Path) -> Self {
        Self {
            install_dir: root.join("opt").join(SERVICE_NAME),
            config_dir: root.join("etc").join(SERVICE_NAME),
            log_dir: root.join("var/log").join(SERVICE_NAME),
            unit_dir: root.join("etc/systemd/system"),
            artifact_name: format!("{}.jar", SERVICE_NAME),
            config_name: "config.yaml".into(),
            unit_name: format!("{}.service", SERVICE_NAME),
        }
    }

    /// The three service-owned directories.
    pub fn owned_dirs(&self) -> [&Path; 3] {
        [&self.install_dir, &self.config_dir, &self.log_dir]
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.install_dir.join(&self.artifact_name)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(&self.config_name)
    }

    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(&self.unit_name)
    }
}

/// The unprivileged account the service runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub user: String,
    pub group: String,
}

impl ServiceIdentity {
    pub fn standard() -> Self {
        Self {
            user: SERVICE_NAME.into(),
            group: SERVICE_NAME.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layout() {
        let l = Layout::standard();
        assert_eq!(l.artifact_path(), Path::new("/opt/socks-lb/socks-lb.jar"));
        assert_eq!(l.config_path(), Path::new("/etc/socks-lb/config.yaml"));
        assert_eq!(l.log_dir, Path::new("/var/log/socks-lb"));
        assert_eq!(l.unit_path(), Path::new("/etc/systemd/system/socks-lb.service"));
    }

    #[test]
    fn test_build_request_paths() {
        let req = Settings::default().build_request(&Layout::standard());
        assert_eq!(req.artifact, Path::new("target/socks-lb.jar"));
        assert_eq!(req.unit_template, Path::new("socks-lb.service"));
    }
}
