//! Environment detection: distribution identity and package manager.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::command::Host;
use crate::error::{ProvisionError, Result};
use crate::pkg::PackageManager;

const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// What the rest of the pipeline needs to know about the host. Built once,
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// os-release `ID`, e.g. "debian", "rocky".
    pub distro_id: String,
    /// os-release `ID_LIKE`, split on whitespace.
    pub distro_like: Vec<String>,
    pub version_id: Option<String>,
    pub version_codename: Option<String>,
    pub pretty_name: String,
    pub package_manager: PackageManager,
}

impl Environment {
    /// True if the distribution is `id` or declares itself like `id`.
    pub fn is_like(&self, id: &str) -> bool {
        self.distro_id == id || self.distro_like.iter().any(|l| l == id)
    }
}

/// Parsed key/value pairs of an os-release file.
#[derive(Debug, Default, Clone)]
pub struct OsRelease(HashMap<String, String>);

impl OsRelease {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

pub fn parse_os_release(text: &str) -> OsRelease {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        map.insert(key.trim().to_string(), value.to_string());
    }
    OsRelease(map)
}

/// Identify the host. Fails if no supported package manager is installed.
pub fn detect(host: &dyn Host) -> Result<Environment> {
    let release = OS_RELEASE_PATHS
        .iter()
        .find_map(|p| host.read_file(Path::new(p)).ok())
        .map(|text| parse_os_release(&text))
        .unwrap_or_default();

    let package_manager = PackageManager::PRIORITY
        .into_iter()
        .find(|pm| {
            let found = host.find_program(pm.executable());
            debug!("probe {}: {:?}", pm.executable(), found);
            found.is_some()
        })
        .ok_or_else(|| {
            ProvisionError::Environment(
                "no supported package manager found (need one of apt-get, dnf, yum, pacman, zypper)"
                    .into(),
            )
        })?;

    let distro_id = release.get("ID").unwrap_or("linux").to_lowercase();
    let env = Environment {
        distro_like: release
            .get("ID_LIKE")
            .map(|l| l.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default(),
        version_id: release.get("VERSION_ID").map(str::to_string),
        version_codename: release
            .get("VERSION_CODENAME")
            .or_else(|| release.get("UBUNTU_CODENAME"))
            .map(str::to_string),
        pretty_name: release
            .get("PRETTY_NAME")
            .map(str::to_string)
            .unwrap_or_else(|| distro_id.clone()),
        distro_id,
        package_manager,
    };

    info!(
        "Detected {} (id={}, like=[{}]), package manager: {}",
        env.pretty_name,
        env.distro_id,
        env.distro_like.join(" "),
        env.package_manager
    );
    Ok(env)
}
