//! Body file (`.datN`) appends
//!
//! Body files are only ever appended to. Every write starts at the first
//! 128-byte boundary at or after the current end of file and is padded so the
//! file ends on a boundary again.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use tracing::debug;
use xivpatch_formats::index::{ENTRY_ALIGNMENT, Locator};

use crate::layout::{GameInstall, RepositoryLocation};
use crate::{Result, StorageError};

/// Appends container entries to existing body files
///
/// Handles stay open for the lifetime of the writer, one per body file.
#[derive(Debug)]
pub struct DatWriter {
    install: GameInstall,
    handles: HashMap<(RepositoryLocation, u8), File>,
}

impl DatWriter {
    /// Create a writer for `install`
    pub fn new(install: &GameInstall) -> Self {
        Self {
            install: install.clone(),
            handles: HashMap::new(),
        }
    }

    /// Append `entry` to body file `body_index` of `location`
    ///
    /// Returns the aligned start offset. The file must already exist; body
    /// files are never created.
    pub fn append(
        &mut self,
        location: &RepositoryLocation,
        body_index: u8,
        entry: &[u8],
    ) -> Result<u64> {
        self.append_entry(location, body_index, entry)
            .map(Locator::offset)
    }

    /// Append `entry` and return the locator that points at it
    pub fn append_entry(
        &mut self,
        location: &RepositoryLocation,
        body_index: u8,
        entry: &[u8],
    ) -> Result<Locator> {
        let file = self.handle(location, body_index)?;

        let end = file.seek(SeekFrom::End(0))?;
        let start = align(end);
        let locator = Locator::new(body_index, start)?;

        file.seek(SeekFrom::Start(start))?;
        file.write_all(entry)?;
        let padding = align(entry.len() as u64) - entry.len() as u64;
        if padding > 0 {
            file.write_all(&vec![0u8; padding as usize])?;
        }
        file.sync_all()?;

        debug!(
            "Appended {} bytes to {}/{} at 0x{:X}",
            entry.len(),
            location,
            location.body_file_name(body_index),
            start
        );
        Ok(locator)
    }

    /// Flush and close every open body file
    pub fn close(self) -> Result<()> {
        for file in self.handles.into_values() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn handle(&mut self, location: &RepositoryLocation, body_index: u8) -> Result<&mut File> {
        let key = (location.clone(), body_index);
        if !self.handles.contains_key(&key) {
            let path = self.install.body_path(location, body_index);
            if !path.is_file() {
                return Err(StorageError::MissingFile(path));
            }
            let file = OpenOptions::new().read(true).write(true).open(&path)?;
            self.handles.insert(key.clone(), file);
        }
        self.handles
            .get_mut(&key)
            .ok_or_else(|| StorageError::MissingFile(self.install.body_path(location, body_index)))
    }
}

const fn align(value: u64) -> u64 {
    (value + ENTRY_ALIGNMENT - 1) & !(ENTRY_ALIGNMENT - 1)
}
