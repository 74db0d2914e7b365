use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{trace, warn};

const SOURCE_NAME: &str = "program.pas";
const ARTIFACT_NAME: &str = "program";

/// Private directory holding one submission's source and compiled artifact.
///
/// Removed when dropped, whichever way the pipeline exits.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    source: PathBuf,
    artifact: PathBuf,
}

impl Workspace {
    /// Creates `<root>/fpcbox_<nonce>` with mode 0700.
    pub fn create(root: &Path) -> Result<Self> {
        loop {
            let nonce: u64 = rand::random();
            let dir = root.join(format!("fpcbox_{:016x}", nonce));
            match DirBuilder::new().mode(0o700).create(&dir) {
                Ok(()) => {
                    trace!(dir = %dir.display(), "workspace created");
                    return Ok(Self {
                        source: dir.join(SOURCE_NAME),
                        artifact: dir.join(ARTIFACT_NAME),
                        dir,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("failed to create workspace: root = {}", root.display())
                    })
                }
            }
        }
    }

    /// Materializes the source file.
    pub fn write_source(&self, source: &str) -> Result<()> {
        fs::write(&self.source, source)
            .with_context(|| format!("failed to write source: path = {}", self.source.display()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => trace!(dir = %self.dir.display(), "workspace removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(dir = %self.dir.display(), %err, "failed to remove workspace"),
        }
    }
}
