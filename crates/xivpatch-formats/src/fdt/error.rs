//! Font table error types

use thiserror::Error;

/// Font table error type
#[derive(Debug, Error)]
pub enum FdtError {
    /// File is shorter than the fixed header
    #[error("font table too short: {0} bytes")]
    TooShort(usize),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for font table operations
pub type FdtResult<T> = Result<T, FdtError>;
