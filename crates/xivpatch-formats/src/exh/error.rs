//! Sheet schema error types

use thiserror::Error;

/// Schema-specific error type
#[derive(Debug, Error)]
pub enum ExhError {
    /// File is not an `EXHF` schema
    #[error("not a sheet schema (magic {0:02X?})")]
    InvalidMagic([u8; 4]),

    /// Binary parsing error, typically a truncated column or page table
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for schema operations
pub type ExhResult<T> = Result<T, ExhError>;
