//! Renderers for the merged field set, and the staged file replacement both
//! outputs go through.

pub mod proto;

pub use proto::render_proto;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// New contents for `target`, fully written to a temporary file next to it
/// but not yet visible under the target name.
///
/// Dropping a staged write without committing removes the temporary file,
/// so a run that fails between staging and committing leaves nothing behind.
#[derive(Debug)]
pub struct StagedWrite {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Write `contents` to a temporary file in the target's directory. Fails
    /// here, not at commit, when the directory is missing or unwritable.
    pub fn stage(target: &Path, contents: &[u8]) -> io::Result<Self> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;

        Ok(Self {
            tmp,
            target: target.to_path_buf(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically replace the target with the staged contents.
    pub fn commit(self) -> io::Result<()> {
        self.tmp.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}
