//! Scripted [`Host`] for unit tests.
//!
//! Commands succeed with empty output unless a rule matches. Rules match on
//! the rendered command line prefix; the most recently added matching rule
//! wins. Files, symlinks and `PATH` lookups live in memory.
//!
//! `PATH` is sudo's default `secure_path`: a symlink only makes its name
//! resolvable when it lands in one of those directories.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::command::{Cmd, CmdOutput, Host};

type Responder = Rc<dyn Fn(&RecordingHost, &Cmd) -> CmdOutput>;

const SECURE_PATH: [&str; 4] = ["/usr/sbin", "/usr/bin", "/sbin", "/bin"];

#[derive(Default)]
pub struct RecordingHost {
    calls: RefCell<Vec<Cmd>>,
    rules: RefCell<Vec<(String, Responder)>>,
    interrupts: RefCell<Vec<String>>,
    programs: RefCell<BTreeSet<String>>,
    files: RefCell<BTreeMap<PathBuf, String>>,
    symlinks: RefCell<Vec<(PathBuf, PathBuf)>>,
}

pub fn ok() -> CmdOutput {
    CmdOutput { code: Some(0), ..Default::default() }
}

pub fn ok_stdout(s: &str) -> CmdOutput {
    CmdOutput { code: Some(0), stdout: s.into(), ..Default::default() }
}

pub fn ok_stderr(s: &str) -> CmdOutput {
    CmdOutput { code: Some(0), stderr: s.into(), ..Default::default() }
}

pub fn fail(code: i32, stderr: &str) -> CmdOutput {
    CmdOutput { code: Some(code), stderr: stderr.into(), ..Default::default() }
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` resolvable through [`Host::find_program`].
    pub fn with_program(&self, name: &str) -> &Self {
        self.programs.borrow_mut().insert(name.to_string());
        self
    }

    pub fn with_file(&self, path: impl Into<PathBuf>, contents: &str) -> &Self {
        self.files.borrow_mut().insert(path.into(), contents.to_string());
        self
    }

    /// Answer commands starting with `prefix` by calling `f`.
    pub fn on(
        &self,
        prefix: &str,
        f: impl Fn(&RecordingHost, &Cmd) -> CmdOutput + 'static,
    ) -> &Self {
        self.rules.borrow_mut().push((prefix.to_string(), Rc::new(f)));
        self
    }

    /// Answer commands starting with `prefix` with each output in turn,
    /// repeating the last one once the list is exhausted.
    pub fn respond(&self, prefix: &str, outputs: Vec<CmdOutput>) -> &Self {
        assert!(!outputs.is_empty());
        let next = Cell::new(0usize);
        self.on(prefix, move |_, _| {
            let i = next.get().min(outputs.len() - 1);
            next.set(i + 1);
            outputs[i].clone()
        })
    }

    /// Fail commands starting with `prefix` the way a run hit by Ctrl-C does.
    pub fn interrupt(&self, prefix: &str) -> &Self {
        self.interrupts.borrow_mut().push(prefix.to_string());
        self
    }

    /// Rendered command lines, in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.commands().iter().any(|c| c.starts_with(prefix))
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.borrow().get(path.as_ref()).cloned()
    }

    pub fn symlinks(&self) -> Vec<(PathBuf, PathBuf)> {
        self.symlinks.borrow().clone()
    }
}

impl Host for RecordingHost {
    fn run(&self, cmd: &Cmd) -> io::Result<CmdOutput> {
        self.calls.borrow_mut().push(cmd.clone());
        let line = cmd.to_string();

        if self.interrupts.borrow().iter().any(|p| line.starts_with(p.as_str())) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted by signal"));
        }

        // Release the borrow before calling out, so responders may add rules.
        let responder = self
            .rules
            .borrow()
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, f)| Rc::clone(f));
        Ok(responder.map(|f| f(self, cmd)).unwrap_or_else(ok))
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        if self.programs.borrow().contains(name) {
            return Some(PathBuf::from("/usr/bin").join(name));
        }
        self.symlinks
            .borrow()
            .iter()
            .map(|(_, link)| link)
            .find(|link| {
                link.file_name().is_some_and(|f| f == name)
                    && link
                        .parent()
                        .is_some_and(|dir| SECURE_PATH.iter().any(|p| dir == Path::new(p)))
            })
            .cloned()
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.files.borrow_mut().insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        self.symlinks
            .borrow_mut()
            .push((target.to_path_buf(), link.to_path_buf()));
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.files.borrow_mut().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responder_may_add_rules() {
        let host = RecordingHost::new();
        host.on("first", |h, _| {
            h.on("second", |_, _| fail(3, "nested"));
            ok()
        });
        assert!(host.run(&Cmd::new("first")).unwrap().success());
        assert_eq!(host.run(&Cmd::new("second")).unwrap().code, Some(3));
    }

    #[test]
    fn test_symlink_outside_secure_path_not_found() {
        let host = RecordingHost::new();
        host.symlink(Path::new("/opt/tool/bin/tool"), Path::new("/usr/local/bin/tool"))
            .unwrap();
        assert!(host.find_program("tool").is_none());
        host.symlink(Path::new("/opt/tool/bin/tool"), Path::new("/usr/bin/tool"))
            .unwrap();
        assert_eq!(host.find_program("tool"), Some(PathBuf::from("/usr/bin/tool")));
    }
}
