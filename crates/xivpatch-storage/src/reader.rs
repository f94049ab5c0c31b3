//! Original entry access
//!
//! The patch pipeline only ever needs one question answered about the
//! archives as shipped: "what are the decoded bytes of this address in this
//! repository". [`EntrySource`] is that question; [`SqPackReader`] answers it
//! from the files of a game install.

use std::collections::HashMap;
use std::fs::File;

use tracing::debug;
use xivpatch_formats::EntryAddress;
use xivpatch_formats::container::decode_entry;
use xivpatch_formats::index::{IndexBuffer, IndexKind, Locator};

use crate::layout::{GameInstall, RepositoryLocation};
use crate::{Result, StorageError};

/// Read-only access to original archive entries
pub trait EntrySource {
    /// Decoded bytes of `address` in `location`, or `None` if not indexed there
    fn read_entry(
        &mut self,
        location: &RepositoryLocation,
        address: EntryAddress,
    ) -> Result<Option<Vec<u8>>>;
}

/// [`EntrySource`] backed by the index and body files of a game install
///
/// Primary indexes are read once per repository and body files stay open
/// for the lifetime of the reader.
#[derive(Debug)]
pub struct SqPackReader {
    install: GameInstall,
    indexes: HashMap<RepositoryLocation, Option<IndexBuffer>>,
    bodies: HashMap<(RepositoryLocation, u8), File>,
}

impl SqPackReader {
    /// Create a reader for `install`
    pub fn new(install: &GameInstall) -> Self {
        Self {
            install: install.clone(),
            indexes: HashMap::new(),
            bodies: HashMap::new(),
        }
    }

    /// Locator of `address` in the primary index of `location`
    pub fn locate(
        &mut self,
        location: &RepositoryLocation,
        address: EntryAddress,
    ) -> Result<Option<Locator>> {
        if !self.indexes.contains_key(location) {
            let path = self.install.index_path(location, IndexKind::Primary);
            let index = if path.is_file() {
                Some(IndexBuffer::from_bytes(
                    std::fs::read(&path)?,
                    IndexKind::Primary,
                )?)
            } else {
                debug!("No index for {}", location);
                None
            };
            self.indexes.insert(location.clone(), index);
        }
        Ok(self
            .indexes
            .get(location)
            .and_then(Option::as_ref)
            .and_then(|index| index.lookup(address)))
    }

    fn body(&mut self, location: &RepositoryLocation, body_index: u8) -> Result<&mut File> {
        let key = (location.clone(), body_index);
        if !self.bodies.contains_key(&key) {
            let path = self.install.body_path(location, body_index);
            if !path.is_file() {
                return Err(StorageError::MissingFile(path));
            }
            self.bodies.insert(key.clone(), File::open(&path)?);
        }
        self.bodies
            .get_mut(&key)
            .ok_or_else(|| StorageError::MissingFile(self.install.body_path(location, body_index)))
    }
}

impl EntrySource for SqPackReader {
    fn read_entry(
        &mut self,
        location: &RepositoryLocation,
        address: EntryAddress,
    ) -> Result<Option<Vec<u8>>> {
        let Some(locator) = self.locate(location, address)? else {
            return Ok(None);
        };
        let file = self.body(location, locator.body_index())?;
        let data = decode_entry(file, locator.offset())?;
        debug!(
            "Read {} from {} at {} ({} bytes)",
            address,
            location,
            locator,
            data.len()
        );
        Ok(Some(data))
    }
}
