//! Index error types

use thiserror::Error;

/// Index-specific error type
#[derive(Debug, Error)]
pub enum IndexError {
    /// File is too short to hold the segment descriptor header
    #[error("index too short: {len} bytes (need at least {min})")]
    TooShort {
        /// Actual length
        len: usize,
        /// Minimum length
        min: usize,
    },

    /// Segment starts inside the descriptor header
    #[error("segment {segment} starts at 0x{offset:X}, inside the header")]
    SegmentInHeader {
        /// Segment number
        segment: usize,
        /// Declared offset
        offset: u32,
    },

    /// Segment extends past the end of the file
    #[error("segment {segment} at 0x{offset:X}+0x{size:X} exceeds file length 0x{len:X}")]
    SegmentOutOfBounds {
        /// Segment number
        segment: usize,
        /// Declared offset
        offset: u32,
        /// Declared size
        size: u32,
        /// File length
        len: usize,
    },

    /// Segment size is not a whole number of records
    #[error("segment size {size} is not a multiple of record size {record_size}")]
    MisalignedSegment {
        /// Declared size
        size: u32,
        /// Record size for this index kind
        record_size: usize,
    },

    /// Body offset is not aligned for a locator
    #[error("body offset 0x{0:X} is not 128-byte aligned")]
    UnalignedOffset(u64),

    /// Body offset does not fit in a locator
    #[error("body offset 0x{0:X} exceeds the locator range")]
    OffsetTooLarge(u64),

    /// Body file index does not fit in a locator
    #[error("body file index {0} exceeds 7")]
    InvalidBodyIndex(u8),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
