//! Package manager kinds and their command templates.

use std::fmt;

use crate::command::Cmd;

/// A supported system package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
}

impl PackageManager {
    /// Probe order used by environment detection: Debian family first, then
    /// the two RPM-family tools, then Arch, then openSUSE.
    pub const PRIORITY: [PackageManager; 5] = [
        PackageManager::Apt,
        PackageManager::Dnf,
        PackageManager::Yum,
        PackageManager::Pacman,
        PackageManager::Zypper,
    ];

    /// The executable whose presence selects this kind.
    pub fn executable(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Pacman => "pacman",
            PackageManager::Zypper => "zypper",
        }
    }

    /// Refresh repository metadata.
    pub fn refresh(self) -> Cmd {
        match self {
            PackageManager::Apt => Cmd::new("apt-get").args(["update", "-q"]),
            PackageManager::Dnf => Cmd::new("dnf").args(["-y", "makecache"]),
            PackageManager::Yum => Cmd::new("yum").args(["-y", "makecache"]),
            PackageManager::Pacman => Cmd::new("pacman").args(["-Sy", "--noconfirm"]),
            PackageManager::Zypper => {
                Cmd::new("zypper").args(["--non-interactive", "--gpg-auto-import-keys", "refresh"])
            }
        }
    }

    /// Non-interactive install of `packages`.
    pub fn install(self, packages: &[&str]) -> Cmd {
        let base = match self {
            PackageManager::Apt => Cmd::new("apt-get").args(["install", "-y", "-q"]),
            PackageManager::Dnf => Cmd::new("dnf").args(["install", "-y"]),
            PackageManager::Yum => Cmd::new("yum").args(["install", "-y"]),
            PackageManager::Pacman => {
                Cmd::new("pacman").args(["-S", "--noconfirm", "--needed"])
            }
            PackageManager::Zypper => Cmd::new("zypper").args(["--non-interactive", "install"]),
        };
        base.args(packages.iter().copied())
    }

    /// Whether installs should be preceded by a metadata refresh. apt and
    /// pacman ship without a usable package index on fresh images.
    pub fn needs_refresh_before_install(self) -> bool {
        matches!(self, PackageManager::Apt | PackageManager::Pacman)
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let names: Vec<_> = PackageManager::PRIORITY.iter().map(|p| p.executable()).collect();
        assert_eq!(names, ["apt-get", "dnf", "yum", "pacman", "zypper"]);
    }

    #[test]
    fn test_install_templates() {
        assert_eq!(
            PackageManager::Apt.install(&["git", "curl"]).to_string(),
            "apt-get install -y -q git curl"
        );
        assert_eq!(
            PackageManager::Pacman.install(&["maven"]).to_string(),
            "pacman -S --noconfirm --needed maven"
        );
        assert_eq!(
            PackageManager::Zypper.install(&["git"]).to_string(),
            "zypper --non-interactive install git"
        );
    }
}
