//! The `./harddrive` jail that `cd`, `ls` and `load` are confined to. The
//! emulator never touches the filesystem outside of it.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub struct Sandbox {
    root: PathBuf,
    cwd: PathBuf,
}

impl Sandbox {
    /// Creates `./harddrive` if it doesn't exist yet and opens it as the
    /// sandbox root and initial working directory.
    pub fn open() -> Result<Sandbox> {
        let root = PathBuf::from("./harddrive");
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Sandbox {
            cwd: root.clone(),
            root,
        })
    }

    fn confine(&self, path: PathBuf) -> Result<PathBuf> {
        let canonical = path.canonicalize()?;
        if canonical.starts_with(&self.root) {
            Ok(canonical)
        } else {
            Err(Error::SandboxViolation(canonical))
        }
    }

    pub fn cd(&mut self, dir: &str) -> Result<()> {
        let target = self.confine(self.cwd.join(dir))?;
        self.cwd = target;
        Ok(())
    }

    pub fn ls(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = std::fs::read_dir(&self.cwd)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Resolves a (sandboxed, existing) file path relative to the current
    /// working directory, for `load`.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        self.confine(self.cwd.join(path))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cd_outside_the_root_is_rejected() {
        let dir = tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let mut sandbox = Sandbox::open().unwrap();
        assert!(sandbox.cd("..").is_err());
    }

    #[test]
    fn ls_lists_files_in_the_root() {
        let dir = tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let sandbox = Sandbox::open().unwrap();
        std::fs::write(sandbox.cwd().join("program.hex"), ":00000001FF\n").unwrap();
        assert_eq!(sandbox.ls().unwrap(), vec!["program.hex".to_string()]);
    }
}
