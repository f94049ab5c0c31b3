//! Sheet page error types

use thiserror::Error;

/// Sheet-specific error type
#[derive(Debug, Error)]
pub enum ExdError {
    /// Data is not an `EXDF` sheet page
    #[error("not a sheet page")]
    NotASheet,

    /// Rebuilt sheet does not fit the 32-bit size fields
    #[error("sheet too large: {0} bytes")]
    TooLarge(usize),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for sheet operations
pub type ExdResult<T> = Result<T, ExdError>;
