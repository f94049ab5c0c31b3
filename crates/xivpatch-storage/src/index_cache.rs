//! Per-run index buffers
//!
//! Each index file touched by a run is read once, mutated in memory in the
//! order items are processed, and written back once at the end. Nothing is
//! written before [`IndexCache::write_back`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::{debug, info, warn};
use xivpatch_formats::EntryAddress;
use xivpatch_formats::index::{IndexBuffer, IndexKind, Locator, Upsert};

use crate::Result;
use crate::layout::{GameInstall, RepositoryLocation};

/// In-memory index files of one patch run
#[derive(Debug)]
pub struct IndexCache {
    install: GameInstall,
    buffers: BTreeMap<(RepositoryLocation, IndexKind), IndexBuffer>,
}

impl IndexCache {
    /// Create an empty cache for `install`
    pub fn new(install: &GameInstall) -> Self {
        Self {
            install: install.clone(),
            buffers: BTreeMap::new(),
        }
    }

    /// Buffer of the index of `kind` for `location`, loading it on first use
    ///
    /// Returns `None` when the index file does not exist.
    pub fn get_mut(
        &mut self,
        location: &RepositoryLocation,
        kind: IndexKind,
    ) -> Result<Option<&mut IndexBuffer>> {
        let key = (location.clone(), kind);
        if !self.buffers.contains_key(&key) {
            let path = self.install.index_path(location, kind);
            if !path.is_file() {
                debug!("No {} index for {}", kind.extension(), location);
                return Ok(None);
            }
            let buffer = IndexBuffer::from_bytes(std::fs::read(&path)?, kind)?;
            debug!(
                "Loaded {} ({} records)",
                path.display(),
                buffer.record_count()
            );
            self.buffers.insert(key.clone(), buffer);
        }
        Ok(self.buffers.get_mut(&key))
    }

    /// Point `address` at `locator` in the index of `kind` for `location`
    ///
    /// Returns `None` when the index file does not exist.
    pub fn upsert(
        &mut self,
        location: &RepositoryLocation,
        kind: IndexKind,
        address: EntryAddress,
        locator: Locator,
    ) -> Result<Option<Upsert>> {
        match self.get_mut(location, kind)? {
            Some(buffer) => Ok(Some(buffer.upsert(address, locator)?)),
            None => {
                warn!(
                    "Cannot record {} in {}: index file missing",
                    address, location
                );
                Ok(None)
            }
        }
    }

    /// Number of loaded index files
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Check if no index file has been loaded
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Write every loaded index back to its file
    ///
    /// Each file is replaced atomically: written to a sibling temp file,
    /// synced, then renamed over the original. Returns how many files were
    /// written.
    pub fn write_back(self) -> Result<usize> {
        let mut written = 0;
        for ((location, kind), buffer) in &self.buffers {
            let path = self.install.index_path(location, *kind);
            replace_file(&path, buffer.as_bytes())?;
            debug!(
                "Saved {} ({} records, {} bytes)",
                path.display(),
                buffer.record_count(),
                buffer.as_bytes().len()
            );
            written += 1;
        }
        info!("Wrote {} index files", written);
        Ok(written)
    }
}

fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    let result = write_synced(temp_path, data)
        .and_then(|()| std::fs::rename(temp_path, path).map_err(Into::into));
    if result.is_err() {
        let _ = std::fs::remove_file(temp_path);
    }
    result
}

fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
