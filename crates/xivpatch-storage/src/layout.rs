//! Game install layout
//!
//! ```text
//! <game root>/sqpack/<folder>/<domain>.win32.index
//! <game root>/sqpack/<folder>/<domain>.win32.index2
//! <game root>/sqpack/<folder>/<domain>.win32.dat<N>
//! ```
//!
//! Folders are `ffxiv` for the base game and `ex1`, `ex2`, ... for
//! expansions. Domains are six hex digits: category, expansion, chunk.

use std::fmt;
use std::path::{Path, PathBuf};

use xivpatch_formats::index::IndexKind;

use crate::{Result, StorageError};

/// Archive directory under the game root
pub const SQPACK_DIR: &str = "sqpack";

/// Platform tag in every archive file name
pub const PLATFORM: &str = "win32";

/// One repository: a folder under `sqpack/` and a domain inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryLocation {
    /// Folder name, e.g. `ffxiv` or `ex1`
    pub folder: String,
    /// Domain name, e.g. `0a0000`
    pub domain: String,
}

impl RepositoryLocation {
    /// Create a location from folder and domain names
    pub fn new(folder: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            domain: domain.into(),
        }
    }

    /// File name of the index of `kind`
    pub fn index_file_name(&self, kind: IndexKind) -> String {
        format!("{}.{PLATFORM}.{}", self.domain, kind.extension())
    }

    /// File name of body file `body_index`
    pub fn body_file_name(&self, body_index: u8) -> String {
        format!("{}.{PLATFORM}.dat{body_index}", self.domain)
    }
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.folder, self.domain)
    }
}

/// A game install rooted at the directory that contains `sqpack/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInstall {
    root: PathBuf,
}

impl GameInstall {
    /// Wrap a root without checking it
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Open a root that must contain a `sqpack` directory
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let install = Self::new(root);
        if !install.sqpack_dir().is_dir() {
            return Err(StorageError::Installation(format!(
                "no {SQPACK_DIR} directory under {}",
                install.root.display()
            )));
        }
        Ok(install)
    }

    /// Game root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `sqpack/` directory
    pub fn sqpack_dir(&self) -> PathBuf {
        self.root.join(SQPACK_DIR)
    }

    /// Directory of one repository folder
    pub fn folder_dir(&self, folder: &str) -> PathBuf {
        self.sqpack_dir().join(folder)
    }

    /// Path of the index of `kind` for `location`
    pub fn index_path(&self, location: &RepositoryLocation, kind: IndexKind) -> PathBuf {
        self.folder_dir(&location.folder)
            .join(location.index_file_name(kind))
    }

    /// Path of body file `body_index` for `location`
    pub fn body_path(&self, location: &RepositoryLocation, body_index: u8) -> PathBuf {
        self.folder_dir(&location.folder)
            .join(location.body_file_name(body_index))
    }
}
