//! One-line save file storage.
//!
//! The file holds exactly the exported blob. Export replaces it wholesale;
//! import only looks at the first line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::types::SaveBlob;

#[derive(Debug, Clone)]
pub struct SaveStore {
    path: PathBuf,
}

impl SaveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the blob from the first line of the save file.
    pub fn load(&self) -> Result<SaveBlob> {
        debug!(path = %self.path.display(), "loading save file");
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read save file {}", self.path.display()))?;
        let first = contents
            .lines()
            .next()
            .ok_or_else(|| anyhow!("save file {} is empty", self.path.display()))?;
        if first.is_empty() {
            return Err(anyhow!("save file {} is empty", self.path.display()));
        }
        Ok(SaveBlob::new(first))
    }

    /// Atomically replace the save file with `blob` (temp file + rename).
    pub fn store(&self, blob: &SaveBlob) -> Result<()> {
        if !blob.is_single_line() {
            return Err(anyhow!("save blob spans multiple lines"));
        }
        debug!(path = %self.path.display(), bytes = blob.as_str().len(), "writing save file");
        write_atomic(&self.path, blob.as_str())
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp save file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace save file {}", path.display()))?;
    Ok(())
}
