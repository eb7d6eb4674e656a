//! Ephemeral artifact storage.
//!
//! Cloud-delivered captures never land in a user-visible directory: the
//! camera writes into a uniquely named scratch file, the uploader reads it,
//! and the file is removed no matter how the cycle ends. `ScratchFile` is the
//! removal guarantee: it deletes its path on drop, so release runs on every
//! exit path including panics, exactly once.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Allocates uniquely named scratch files.
///
/// Uniqueness comes from exclusive creation (tempfile reserves the name with
/// O_EXCL); the capture then overwrites the reserved file in place.
#[derive(Clone, Debug, Default)]
pub struct ArtifactStore {
    dir: Option<PathBuf>,
}

impl ArtifactStore {
    /// Store backed by the system temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a specific directory. Tests use this to assert the
    /// no-leak invariant by listing a private directory afterwards.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Reserve a fresh scratch file with the given suffix (e.g. `.jpg`).
    pub fn allocate(&self, suffix: &str) -> Result<ScratchFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pircam-").suffix(suffix);
        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("allocate scratch file")?;
        // Hand removal over to ScratchFile; tempfile's own drop guard must
        // not also delete the path.
        let path = file
            .into_temp_path()
            .keep()
            .context("detach scratch file from tempfile guard")?;
        Ok(ScratchFile { path })
    }
}

/// A reserved scratch path, removed exactly once when this guard goes away.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now. Equivalent to dropping the guard; exists so call
    /// sites can mark the end of the artifact's life explicitly.
    pub fn release(self) {}
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        remove_if_present(&self.path);
    }
}

/// Remove `path` if it exists. Idempotent and silent: release may run after
/// a capture failure (file never written) or after an upload failure (file
/// still present), and neither case is an error.
pub fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => log::warn!("failed to remove {}: {}", path.display(), err),
    }
}
