//! Error types for the patch pipeline.
//!
//! [`PatchError`] is what a run returns: precondition failures, cancellation
//! and fatal storage errors. [`ItemError`] covers everything that only costs a
//! single queued item; those are logged and counted, never returned.

use std::path::PathBuf;
use thiserror::Error;
use xivpatch_formats::container::ContainerError;
use xivpatch_formats::exd::ExdError;
use xivpatch_formats::exh::ExhError;
use xivpatch_formats::fdt::FdtError;
use xivpatch_storage::StorageError;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Game install directory is not usable
    #[error("Game directory has no sqpack folder: {}", .0.display())]
    GameRootMissing(PathBuf),

    /// Patch resource directory does not exist
    #[error("Resource directory not found: {}", .0.display())]
    ResourceRootMissing(PathBuf),

    /// Font merge settings are inconsistent
    #[error("Invalid font merge settings: {0}")]
    FontMerge(String),
}

/// Errors that end a patch run.
#[derive(Debug, Error)]
pub enum PatchError {
    /// A game client holds the archives open
    #[error("Game process is running: {0}")]
    GameRunning(String),

    /// Patch resource directory disappeared before the run started
    #[error("Resource directory not found: {}", .0.display())]
    ResourcePathMissing(PathBuf),

    /// Run was cancelled between two items
    #[error("Patch run cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Archive file could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Patch input tree could not be walked
    #[error("Failed to scan patch inputs under {path}: {source}")]
    InputScan {
        /// Directory being walked
        path: PathBuf,
        /// Underlying walk error
        #[source]
        source: walkdir::Error,
    },
}

/// Errors that skip a single queued item.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Sheet schema entry is not in the archives
    #[error("No schema for sheet {0}")]
    MissingSchema(String),

    /// Entry path is not indexed and has no fallback repository
    #[error("{0} is not indexed in any repository")]
    NotIndexed(String),

    /// Repository has no index file to record the entry in
    #[error("Index file for {0} is missing")]
    MissingIndex(String),

    /// Patch input could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// Input file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Sheet schema error
    #[error("Schema error: {0}")]
    Schema(#[from] ExhError),

    /// Sheet page error
    #[error("Sheet error: {0}")]
    Sheet(#[from] ExdError),

    /// Font table error
    #[error("Font error: {0}")]
    Font(#[from] FdtError),

    /// Entry encoding error
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Index or body error limited to this item
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
