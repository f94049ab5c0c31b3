//! SqPack format codecs for in-place archive patching
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many SqPack-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::cast_precision_loss)] // Numeric sheet columns
//! This crate provides the in-memory side of the patcher: every structure here
//! is decoded from and encoded back to byte buffers, never touching the file
//! system. The storage crate owns file handles; this crate owns layout.
//!
//! # Supported Formats
//!
//! - **Hash**: Path and file name CRC used to address archive entries
//! - **Index**: `.index` / `.index2` segment tables, lookup and in-place expansion
//! - **Container**: Per-entry block container stored in `.dat` body files
//! - **CSV**: Four-row-header patch tables
//! - **EXH**: Sheet schema (column layout and page ranges)
//! - **EXD**: Sheet pages and the row patcher
//! - **FDT**: Font glyph tables, merge and kerning repair
//!
//! # Design Principles
//!
//! - **Byte-exact**: Every writer preserves the fields it does not understand
//! - **Little-endian containers, big-endian sheets**: The archive formats mix both
//! - **Best-effort patches**: Malformed patch values keep the original bytes

#![warn(missing_docs)]

/// Block container stored at every index locator
///
/// Entries in `.dat` body files consist of an entry header with a block table
/// followed by 128-byte aligned blocks. Blocks are either stored raw (size
/// marker `32000`) or DEFLATE-compressed.
///
/// Key features:
/// - **Binary and texture builders**: Never compress, always 128-byte aligned
/// - **Tolerant reader**: Truncated last blocks and short files decode partially
/// - **Mip tables**: Texture entries keep their raw sub-header verbatim
pub mod container;
/// Four-row-header CSV patch tables
pub mod csv;
/// Font definition (FDT) glyph tables
///
/// Glyph tables are sorted by UTF-8 code point and followed by an opaque
/// kerning block. This module merges two tables and repairs the kerning
/// pointer after a table changes size.
pub mod fdt;
/// Sheet pages (EXDF) and the per-row patcher
pub mod exd;
/// Sheet schema (EXHF) reader
pub mod exh;
/// Entry addressing hash
pub mod hash;
/// Index files (`.index` / `.index2`)
///
/// Index files are a fixed-position descriptor header followed by segments.
/// The first segment is a sorted table of `(address, locator)` records that
/// the game binary-searches; this module looks entries up and inserts new
/// ones while keeping every other segment offset and checksum consistent.
pub mod index;

pub use hash::{EntryAddress, hash, hash_raw};

/// Round `value` up to the next multiple of `align` (a power of two)
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
