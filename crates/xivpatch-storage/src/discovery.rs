//! Address to repository map
//!
//! Every primary index under `sqpack/` is scanned once per run. Folders are
//! visited in descending name order, domains inside a folder in ascending
//! order, and the first repository to list an address keeps it.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};
use xivpatch_formats::EntryAddress;
use xivpatch_formats::index::{IndexBuffer, IndexKind};

use crate::Result;
use crate::layout::{GameInstall, PLATFORM, RepositoryLocation};

/// Which repository holds each indexed address
#[derive(Debug, Clone, Default)]
pub struct RepositoryMap {
    entries: HashMap<EntryAddress, RepositoryLocation>,
}

impl RepositoryMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every primary index of `install`
    ///
    /// Ties are settled by scan order, first repository wins:
    ///
    /// - across folders, the highest name: `ffxiv`, then `ex5` down to `ex1`,
    ///   so among expansions the newest holds a shared address
    /// - inside one folder, the lowest domain (`000000` before `0a0000`)
    ///
    /// A missing `sqpack` directory yields an empty map. Index files that
    /// cannot be parsed are logged and skipped.
    pub fn scan(install: &GameInstall) -> Result<Self> {
        let mut map = Self::new();
        let sqpack = install.sqpack_dir();
        if !sqpack.is_dir() {
            warn!("No sqpack directory at {}", sqpack.display());
            return Ok(map);
        }

        let mut folders = Vec::new();
        for entry in std::fs::read_dir(&sqpack)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                folders.push(name.to_string());
            }
        }
        folders.sort_unstable_by(|a, b| b.cmp(a));

        let suffix = format!(".{PLATFORM}.{}", IndexKind::Primary.extension());
        for folder in folders {
            let mut domains = Vec::new();
            for entry in std::fs::read_dir(install.folder_dir(&folder))? {
                let entry = entry?;
                if let Some(domain) = entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(&suffix))
                {
                    domains.push(domain.to_string());
                }
            }
            domains.sort_unstable();

            for domain in domains {
                let location = RepositoryLocation::new(folder.as_str(), domain);
                let path = install.index_path(&location, IndexKind::Primary);
                let index = match load_primary(&path) {
                    Ok(index) => index,
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };

                let before = map.len();
                for record in index.records() {
                    map.record(EntryAddress::from_u64(record.key), &location);
                }
                debug!(
                    "Scanned {}: {} records, {} new",
                    location,
                    index.record_count(),
                    map.len() - before
                );
            }
        }

        info!("Mapped {} archive entries", map.len());
        Ok(map)
    }

    /// Record `address` in `location` unless another repository already holds it
    ///
    /// Returns true if the address was new.
    pub fn record(&mut self, address: EntryAddress, location: &RepositoryLocation) -> bool {
        if self.entries.contains_key(&address) {
            return false;
        }
        self.entries.insert(address, location.clone());
        true
    }

    /// Repository holding `address`
    pub fn locate(&self, address: EntryAddress) -> Option<&RepositoryLocation> {
        self.entries.get(&address)
    }

    /// Number of mapped addresses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no address is mapped
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_primary(path: &Path) -> Result<IndexBuffer> {
    Ok(IndexBuffer::from_bytes(
        std::fs::read(path)?,
        IndexKind::Primary,
    )?)
}
