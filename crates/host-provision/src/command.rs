//! Typed external commands and the host they run on.
//!
//! Every side effect the provisioning pipeline has on a machine, other than
//! writing into directories it owns, goes through [`Host`]. The real
//! implementation is [`SystemHost`]; tests substitute a recording fake.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::signal;

/// An external command: program, arguments, optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Run in `dir` instead of the current directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            if a.contains(char::is_whitespace) {
                write!(f, " '{}'", a)?;
            } else {
                write!(f, " {}", a)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// A short human-readable reason for a failed command: the last few
    /// stderr lines, or the exit status when stderr is empty.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        let status = match self.code {
            Some(c) => format!("exit code {}", c),
            None => "killed by signal".to_string(),
        };
        if stderr.is_empty() {
            return status;
        }
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(5)..].join("\n");
        format!("{}: {}", status, tail)
    }
}

/// The machine being provisioned.
pub trait Host {
    /// Run `cmd` to completion, capturing its output. An `Err` means the
    /// command could not be spawned or the run was interrupted; a command
    /// that ran and failed is an `Ok` with a non-zero code.
    fn run(&self, cmd: &Cmd) -> io::Result<CmdOutput>;

    /// Locate an executable on `PATH`.
    fn find_program(&self, name: &str) -> Option<PathBuf>;

    fn read_file(&self, path: &Path) -> io::Result<String>;

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Create (or replace) the symlink `link` pointing at `target`.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// The local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
    fn run(&self, cmd: &Cmd) -> io::Result<CmdOutput> {
        signal::check()?;
        debug!("$ {}", cmd);

        let mut command = Command::new(cmd.program());
        command.args(cmd.get_args());
        if let Some(dir) = cmd.get_dir() {
            command.current_dir(dir);
        }
        let output = command.output()?;

        let out = CmdOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        for line in out.stdout.lines().chain(out.stderr.lines()) {
            debug!("  | {}", line);
        }

        // A Ctrl-C reaches the child too; report the interruption rather
        // than whatever failure the child exited with.
        signal::check()?;
        Ok(out)
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        match std::fs::remove_file(link) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        std::os::unix::fs::symlink(target, link)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = Cmd::new("sh").args(["-c", "echo hi"]);
        assert_eq!(cmd.to_string(), "sh -c 'echo hi'");
    }

    #[test]
    fn test_failure_reason_tail() {
        let out = CmdOutput {
            code: Some(100),
            stdout: String::new(),
            stderr: "a\nb\nc\nd\ne\nf\nE: Unable to locate package foo\n".into(),
        };
        let reason = out.failure_reason();
        assert!(reason.starts_with("exit code 100: "));
        assert!(reason.ends_with("E: Unable to locate package foo"));
        assert!(!reason.contains("\na\n"));
    }

    #[test]
    fn test_failure_reason_no_stderr() {
        let out = CmdOutput { code: None, ..Default::default() };
        assert_eq!(out.failure_reason(), "killed by signal");
    }

    #[test]
    fn test_system_host_runs_true_and_false() {
        let host = SystemHost;
        assert!(host.run(&Cmd::new("true")).unwrap().success());
        assert!(!host.run(&Cmd::new("false")).unwrap().success());
    }

    #[test]
    fn test_system_host_spawn_failure_is_err() {
        let host = SystemHost;
        assert!(host.run(&Cmd::new("definitely-not-a-real-program-xyz")).is_err());
    }
}
