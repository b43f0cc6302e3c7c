// SPDX-License-Identifier: Apache-2.0

use std::fs::remove_file;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// The file the probe writes to: `<dir>/<base>.<pid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    path: PathBuf,
}

impl TargetFile {
    pub fn new(dir: &Path, base: &str) -> Self {
        Self::with_pid(dir, base, std::process::id())
    }

    fn with_pid(dir: &Path, base: &str, pid: u32) -> Self {
        Self {
            path: dir.join(format!("{}.{}", base, pid)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Returns `false` if it was already gone.
    pub fn remove_if_exists(&self) -> io::Result<bool> {
        match remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::{create_dir, File};

    use tempfile::tempdir;

    #[test]
    fn name_carries_pid() {
        let target = TargetFile::with_pid(Path::new("/tmp/work"), "probe", 4242);
        assert_eq!(target.path(), Path::new("/tmp/work/probe.4242"));

        let dir = tempdir().unwrap();
        let target = TargetFile::new(dir.path(), "probe");
        let expected = format!("probe.{}", std::process::id());
        assert_eq!(target.path().file_name().unwrap(), expected.as_str());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let target = TargetFile::new(dir.path(), "probe");
        File::create(target.path()).unwrap();

        assert!(target.remove_if_exists().unwrap());
        assert!(!target.path().exists());
        assert!(!target.remove_if_exists().unwrap());
    }

    #[test]
    fn other_errors_surface() {
        let dir = tempdir().unwrap();
        let target = TargetFile::new(dir.path(), "probe");
        create_dir(target.path()).unwrap();

        assert!(target.remove_if_exists().is_err());
    }
}
