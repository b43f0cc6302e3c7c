// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use tempfile::{Builder, TempDir};

/// A fresh, uniquely named directory holding every file the test creates.
///
/// The directory is removed by [`WorkDir::remove`], or when dropped.
#[derive(Debug)]
pub struct WorkDir(TempDir);

impl WorkDir {
    pub fn create(prefix: &str, parent: Option<&Path>) -> Result<Self> {
        let parent = parent.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let dir = Builder::new()
            .prefix(prefix)
            .tempdir_in(&parent)
            .with_context(|| format!("failed to create a working directory in {:?}", parent))?;

        info!("working directory: {:?}", dir.path());
        Ok(Self(dir))
    }

    pub fn path(&self) -> &Path {
        self.0.path()
    }

    pub fn remove(self) -> io::Result<()> {
        self.0.close()
    }
}
