//! Dependency resolution: a minimum-version Java runtime plus build tooling.
//!
//! Each [`Dependency`] is resolved by a small state machine:
//!
//! ```text
//! check ──ok──▶ AlreadySatisfied
//!   │
//!   └─fail─▶ primary ──ok──▶ verify ──ok──▶ InstalledPrimary
//!               │               └─fail──▶ fatal
//!               └─fail─▶ fallback ──ok──▶ verify ──ok──▶ InstalledFallback
//!                           │                 └─fail──▶ fatal
//!                           └─fail / none ──▶ fatal
//! ```

use std::io;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::command::{Cmd, Host};
use crate::detect::Environment;
use crate::error::{ProvisionError, Result};
use crate::pkg::PackageManager;

pub const JAVA_MIN_MAJOR: u32 = 17;

const ADOPTIUM_KEY_URL: &str = "https://packages.adoptium.net/artifactory/api/gpg/key/public";
const ADOPTIUM_DEB_URL: &str = "https://packages.adoptium.net/artifactory/deb";
const ADOPTIUM_RPM_URL: &str = "https://packages.adoptium.net/artifactory/rpm";
const TEMURIN_PACKAGE: &str = "temurin-17-jdk";

const MAVEN_VERSION: &str = "3.9.6";

// ─── Data model ──────────────────────────────────────────────────────────────

/// How to tell whether a dependency is already satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Run `program args…` and require the reported major version ≥ `min`.
    MinMajorVersion {
        program: String,
        args: Vec<String>,
        min: u32,
    },
    /// Presence on `PATH` is enough.
    OnPath(String),
}

/// One unit of work inside an install action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Run(Cmd),
    WriteFile { path: PathBuf, contents: String },
    Symlink { target: PathBuf, link: PathBuf },
    RemoveFile(PathBuf),
}

/// An ordered list of steps; the first failing step fails the action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Action {
    pub description: String,
    pub steps: Vec<Step>,
}

impl Action {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            steps: Vec::new(),
        }
    }

    fn run(mut self, cmd: Cmd) -> Self {
        self.steps.push(Step::Run(cmd));
        self
    }

    fn write(mut self, path: &str, contents: String) -> Self {
        self.steps.push(Step::WriteFile {
            path: PathBuf::from(path),
            contents,
        });
        self
    }

    fn symlink(mut self, target: &str, link: &str) -> Self {
        self.steps.push(Step::Symlink {
            target: PathBuf::from(target),
            link: PathBuf::from(link),
        });
        self
    }

    fn remove(mut self, path: &str) -> Self {
        self.steps.push(Step::RemoveFile(PathBuf::from(path)));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub probe: Probe,
    pub primary: Action,
    pub fallback: Option<Action>,
}

/// How a dependency ended up satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    AlreadySatisfied,
    InstalledPrimary,
    InstalledFallback,
}

/// Outcome of a failed check, kept for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    NotFound,
    Unparseable(String),
    TooOld { found: u32, min: u32 },
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::NotFound => f.write_str("not installed"),
            ProbeFailure::Unparseable(out) => write!(f, "unrecognised version output {:?}", out),
            ProbeFailure::TooOld { found, min } => {
                write!(f, "major version {} is below the required {}", found, min)
            }
        }
    }
}

// ─── Version parsing ─────────────────────────────────────────────────────────

/// Extract the major version from `java -version` output.
///
/// Handles `openjdk version "17.0.8"`, `openjdk version "21"` and the legacy
/// `java version "1.8.0_292"` numbering, where the major is the second field.
///
/// Lines without a quoted version, such as a `Picked up _JAVA_OPTIONS:` notice
/// mentioning a `*.version` property, are skipped.
pub fn parse_java_major(output: &str) -> Option<u32> {
    output
        .lines()
        .filter(|l| l.contains("version"))
        .find_map(parse_version_line)
}

fn parse_version_line(line: &str) -> Option<u32> {
    let start = line.find('"')? + 1;
    let end = start + line[start..].find('"')?;
    let version = &line[start..end];

    let mut fields = version.split(|c: char| !c.is_ascii_digit());
    let first: u32 = fields.next()?.parse().ok()?;
    if first == 1 {
        fields.next()?.parse().ok()
    } else {
        Some(first)
    }
}

type CheckResult = std::result::Result<(), ProbeFailure>;

impl Probe {
    /// The outer error is an interrupt; everything else is a [`ProbeFailure`].
    pub fn check(&self, host: &dyn Host) -> Result<CheckResult> {
        match self {
            Probe::OnPath(program) => Ok(host
                .find_program(program)
                .map(|_| ())
                .ok_or(ProbeFailure::NotFound)),
            Probe::MinMajorVersion { program, args, min } => {
                if host.find_program(program).is_none() {
                    return Ok(Err(ProbeFailure::NotFound));
                }
                let out = match host.run(&Cmd::new(program.clone()).args(args.iter().cloned())) {
                    Ok(out) => out,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                        return Err(ProvisionError::Interrupted)
                    }
                    Err(_) => return Ok(Err(ProbeFailure::NotFound)),
                };
                // The JVM prints its banner on stderr.
                let text = format!("{}\n{}", out.stderr, out.stdout);
                let Some(found) = parse_java_major(&text) else {
                    return Ok(Err(ProbeFailure::Unparseable(text.trim().to_string())));
                };
                if found >= *min {
                    Ok(Ok(()))
                } else {
                    Ok(Err(ProbeFailure::TooOld { found, min: *min }))
                }
            }
        }
    }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

pub struct Resolver<'a> {
    host: &'a dyn Host,
}

impl<'a> Resolver<'a> {
    pub fn new(host: &'a dyn Host) -> Self {
        Self { host }
    }

    /// Resolve every dependency in order, stopping at the first failure.
    pub fn ensure_all(&self, deps: &[Dependency]) -> Result<Vec<Resolution>> {
        deps.iter().map(|d| self.resolve(d)).collect()
    }

    pub fn resolve(&self, dep: &Dependency) -> Result<Resolution> {
        let initial = match dep.probe.check(self.host)? {
            Ok(()) => {
                info!("{}: already satisfied", dep.name);
                return Ok(Resolution::AlreadySatisfied);
            }
            Err(failure) => failure,
        };
        info!("{}: {}; installing ({})", dep.name, initial, dep.primary.description);

        let resolution = match self.execute(&dep.primary) {
            Ok(()) => Resolution::InstalledPrimary,
            Err(primary_err) => {
                if let ProvisionError::Interrupted = primary_err {
                    return Err(primary_err);
                }
                let Some(fallback) = &dep.fallback else {
                    return Err(ProvisionError::dependency(
                        &dep.name,
                        format!("install failed and no fallback exists: {}", primary_err),
                    ));
                };
                warn!("{}: primary install failed ({}); trying {}", dep.name, primary_err, fallback.description);
                self.execute(fallback).map_err(|fallback_err| match fallback_err {
                    ProvisionError::Interrupted => fallback_err,
                    _ => ProvisionError::dependency(
                        &dep.name,
                        format!(
                            "primary install failed ({}) and fallback failed ({})",
                            primary_err, fallback_err
                        ),
                    ),
                })?;
                Resolution::InstalledFallback
            }
        };

        dep.probe.check(self.host)?.map_err(|failure| {
            ProvisionError::dependency(
                &dep.name,
                format!("install reported success but the check still fails: {}", failure),
            )
        })?;
        info!("{}: installed and verified", dep.name);
        Ok(resolution)
    }

    fn execute(&self, action: &Action) -> Result<()> {
        for step in &action.steps {
            match step {
                Step::Run(cmd) => {
                    let out = self
                        .host
                        .run(cmd)
                        .map_err(|e| ProvisionError::io(format!("could not run `{}`", cmd), e))?;
                    if !out.success() {
                        return Err(ProvisionError::dependency(
                            cmd.program(),
                            format!("`{}` failed with {}", cmd, out.failure_reason()),
                        ));
                    }
                }
                Step::WriteFile { path, contents } => self
                    .host
                    .write_file(path, contents)
                    .map_err(|e| ProvisionError::io(format!("writing {}", path.display()), e))?,
                Step::Symlink { target, link } => self
                    .host
                    .symlink(target, link)
                    .map_err(|e| ProvisionError::io(format!("linking {}", link.display()), e))?,
                Step::RemoveFile(path) => self
                    .host
                    .remove_file(path)
                    .map_err(|e| ProvisionError::io(format!("removing {}", path.display()), e))?,
            }
        }
        Ok(())
    }
}

// ─── Dependency catalogue ────────────────────────────────────────────────────

fn install_action(pm: PackageManager, packages: &[&str]) -> Action {
    let mut action = Action::new(format!("{} install {}", pm, packages.join(" ")));
    if pm.needs_refresh_before_install() {
        action = action.run(pm.refresh());
    }
    action.run(pm.install(packages))
}

/// The Java runtime, minimum major version [`JAVA_MIN_MAJOR`].
pub fn java_runtime(env: &Environment) -> Dependency {
    let pm = env.package_manager;
    let package = match pm {
        PackageManager::Apt => "openjdk-17-jdk-headless",
        PackageManager::Dnf | PackageManager::Yum | PackageManager::Zypper => {
            "java-17-openjdk-devel"
        }
        PackageManager::Pacman => "jdk17-openjdk",
    };

    Dependency {
        name: "java".into(),
        probe: Probe::MinMajorVersion {
            program: "java".into(),
            args: vec!["-version".into()],
            min: JAVA_MIN_MAJOR,
        },
        primary: install_action(pm, &[package]),
        fallback: adoptium_fallback(env),
    }
}

/// Add the Adoptium repository and install Temurin from it.
fn adoptium_fallback(env: &Environment) -> Option<Action> {
    let pm = env.package_manager;
    let arch = std::env::consts::ARCH;
    let action = Action::new("Adoptium Temurin repository");

    match pm {
        PackageManager::Apt => {
            let codename = env.version_codename.clone().unwrap_or_else(|| "stable".into());
            Some(
                action
                    .run(pm.install(&["curl", "ca-certificates"]))
                    .run(Cmd::new("mkdir").args(["-p", "/etc/apt/keyrings"]))
                    .run(Cmd::new("curl").args([
                        "-fsSL",
                        ADOPTIUM_KEY_URL,
                        "-o",
                        "/etc/apt/keyrings/adoptium.asc",
                    ]))
                    .write(
                        "/etc/apt/sources.list.d/adoptium.list",
                        format!(
                            "deb [signed-by=/etc/apt/keyrings/adoptium.asc] {} {} main\n",
                            ADOPTIUM_DEB_URL, codename
                        ),
                    )
                    .run(pm.refresh())
                    .run(pm.install(&[TEMURIN_PACKAGE])),
            )
        }
        PackageManager::Dnf | PackageManager::Yum => {
            let distro = if env.is_like("fedora") && !env.is_like("rhel") {
                "fedora"
            } else {
                "rhel"
            };
            Some(
                action
                    .write(
                        "/etc/yum.repos.d/adoptium.repo",
                        format!(
                            "[Adoptium]\nname=Adoptium\nbaseurl={}/{}/$releasever/$basearch\nenabled=1\ngpgcheck=1\ngpgkey={}\n",
                            ADOPTIUM_RPM_URL, distro, ADOPTIUM_KEY_URL
                        ),
                    )
                    .run(pm.refresh())
                    .run(pm.install(&[TEMURIN_PACKAGE])),
            )
        }
        PackageManager::Zypper => {
            let version = env.version_id.clone().unwrap_or_else(|| "15".into());
            Some(
                action
                    .run(Cmd::new("rpm").args(["--import", ADOPTIUM_KEY_URL]))
                    .run(Cmd::new("zypper").args([
                        "--non-interactive".to_string(),
                        "addrepo".into(),
                        "--refresh".into(),
                        format!("{}/opensuse/{}/{}", ADOPTIUM_RPM_URL, version, arch),
                        "adoptium".into(),
                    ]))
                    .run(pm.refresh())
                    .run(pm.install(&[TEMURIN_PACKAGE])),
            )
        }
        PackageManager::Pacman => None,
    }
}

/// git, Maven and curl. Presence is enough; no version gate.
pub fn build_tools(env: &Environment) -> Vec<Dependency> {
    let pm = env.package_manager;
    let tool = |program: &str, package: &str, fallback: Option<Action>| Dependency {
        name: program.to_string(),
        probe: Probe::OnPath(program.to_string()),
        primary: install_action(pm, &[package]),
        fallback,
    };

    vec![
        tool("git", "git", None),
        tool("curl", "curl", None),
        tool("mvn", "maven", maven_fallback(pm)),
    ]
}

/// Yum-based hosts (CentOS 7, Amazon Linux 2) lack a usable Maven; fetch the
/// upstream binary distribution instead. The link goes in `/usr/bin` because
/// sudo's `secure_path` on those hosts leaves out `/usr/local/bin`.
fn maven_fallback(pm: PackageManager) -> Option<Action> {
    if pm != PackageManager::Yum {
        return None;
    }
    let archive = format!("/opt/apache-maven-{}-bin.tar.gz", MAVEN_VERSION);
    let url = format!(
        "https://archive.apache.org/dist/maven/maven-3/{v}/binaries/apache-maven-{v}-bin.tar.gz",
        v = MAVEN_VERSION
    );
    let home = format!("/opt/apache-maven-{}", MAVEN_VERSION);
    Some(
        Action::new(format!("Apache Maven {} binary distribution", MAVEN_VERSION))
            .run(Cmd::new("curl").args(["-fsSL", url.as_str(), "-o", archive.as_str()]))
            .run(Cmd::new("tar").args(["-xzf", archive.as_str(), "-C", "/opt"]))
            .remove(&archive)
            .symlink(&format!("{}/bin/mvn", home), "/usr/bin/mvn"),
    )
}

// ─── Tests ───────────────────────────────────────────────────────────────────
