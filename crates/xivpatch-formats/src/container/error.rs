//! Container error types

use thiserror::Error;

/// Container-specific error type
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Entry kind field holds an unknown value
    #[error("unknown entry kind: {0}")]
    UnknownKind(u32),

    /// Entry header size is smaller than the fixed header or not aligned
    #[error("invalid entry header size: {0}")]
    InvalidHeaderSize(u32),

    /// Texture input does not have a usable mip layout
    #[error("invalid texture: {0}")]
    InvalidTexture(String),

    /// DEFLATE stream could not be decoded
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;
