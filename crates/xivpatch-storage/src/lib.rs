//! On-disk side of SqPack patching.
//!
//! This crate owns every file handle of a patch run. A game install keeps its
//! archives under `sqpack/<folder>/`, one set of files per domain:
//!
//! - `<domain>.win32.index` and `<domain>.win32.index2`: sorted locator tables
//! - `<domain>.win32.dat0` .. `dat7`: append-only body files holding containers
//!
//! # Run model
//!
//! - [`RepositoryMap`] scans every primary index once to learn which folder and
//!   domain hold each entry address.
//! - [`SqPackReader`] reads original entries through the narrow [`EntrySource`]
//!   accessor.
//! - [`DatWriter`] appends encoded containers at 128-byte aligned offsets.
//! - [`IndexCache`] loads each index file once, takes every mutation of the run
//!   in memory and writes the files back at the end.
//!
//! Body appends are durable as soon as they return; index files only change in
//! [`IndexCache::write_back`]. A run that stops before write-back leaves the
//! archive readable, with some unreferenced bytes at the end of a body file.
//!
//! # Example
//!
//! ```rust,ignore
//! use xivpatch_formats::container::build_binary;
//! use xivpatch_formats::index::IndexKind;
//! use xivpatch_formats::EntryAddress;
//! use xivpatch_storage::{DatWriter, GameInstall, IndexCache, RepositoryLocation};
//!
//! # fn example() -> xivpatch_storage::Result<()> {
//! let install = GameInstall::open("/path/to/game")?;
//! let location = RepositoryLocation::new("ffxiv", "0a0000");
//! let address = EntryAddress::from_path("exd/item_0_en.exd");
//!
//! let mut writer = DatWriter::new(&install);
//! let mut indexes = IndexCache::new(&install);
//! let locator = writer.append_entry(&location, 0, &build_binary(b"...")?)?;
//! indexes.upsert(&location, IndexKind::Primary, address, locator)?;
//! indexes.write_back()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use thiserror::Error;
use xivpatch_formats::container::ContainerError;
use xivpatch_formats::index::IndexError;

// Install layout and repository naming
pub mod layout;

// Body file appends
pub mod dat_writer;

// Per-run index buffers
pub mod index_cache;

// Original entry access
pub mod reader;

// Address to repository map
pub mod discovery;

pub use dat_writer::DatWriter;
pub use discovery::RepositoryMap;
pub use index_cache::IndexCache;
pub use layout::{GameInstall, RepositoryLocation};
pub use reader::{EntrySource, SqPackReader};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Index file is malformed or cannot take the mutation.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Entry container is malformed.
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Archive file that a run expects to exist is missing.
    #[error("Archive file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// Game install layout is not usable.
    #[error("Installation error: {0}")]
    Installation(String),
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_support {
    use super::{GameInstall, RepositoryLocation};
    use tempfile::{TempDir, tempdir};
    use xivpatch_formats::index::{IndexKind, adler32};

    /// Temporary install with an empty `sqpack/ffxiv` folder
    pub fn install() -> (TempDir, GameInstall) {
        let dir = tempdir().expect("tempdir");
        let install = GameInstall::new(dir.path());
        std::fs::create_dir_all(install.folder_dir("ffxiv")).expect("mkdir");
        (dir, install)
    }

    /// Index bytes holding only a segment 0 with the given sorted records
    pub fn index_bytes(kind: IndexKind, records: &[(u64, u32)]) -> Vec<u8> {
        let mut data = vec![0u8; 0x800];
        for &(key, locator) in records {
            match kind {
                IndexKind::Primary => {
                    data.extend_from_slice(&key.to_le_bytes());
                    data.extend_from_slice(&locator.to_le_bytes());
                    data.extend_from_slice(&[0u8; 4]);
                }
                IndexKind::Secondary => {
                    data.extend_from_slice(&(key as u32).to_le_bytes());
                    data.extend_from_slice(&locator.to_le_bytes());
                }
            }
        }
        let size = (data.len() - 0x800) as u32;
        let checksum = adler32(&data[0x800..]);
        data[0x400..0x404].copy_from_slice(&0x400u32.to_le_bytes());
        data[0x408..0x40C].copy_from_slice(&0x800u32.to_le_bytes());
        data[0x40C..0x410].copy_from_slice(&size.to_le_bytes());
        data[0x410..0x414].copy_from_slice(&checksum.to_le_bytes());
        data
    }

    /// Write an index file for `location` into `install`
    pub fn write_index(
        install: &GameInstall,
        location: &RepositoryLocation,
        kind: IndexKind,
        records: &[(u64, u32)],
    ) {
        std::fs::create_dir_all(install.folder_dir(&location.folder)).expect("mkdir");
        std::fs::write(install.index_path(location, kind), index_bytes(kind, records))
            .expect("write index");
    }
}
