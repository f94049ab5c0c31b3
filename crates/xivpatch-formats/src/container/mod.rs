//! Per-entry block container
//!
//! Every index locator points at one entry in a `.dat` body file:
//!
//! ```text
//! Entry header (128-byte aligned):
//!   [0]  header size      [4]  kind
//!   [8]  decoded size     [12] allocated units
//!   [16] body units       [20] block count (mip count for textures)
//!   [24] block table (binary) or mip table + u16 block sizes (texture)
//! Blocks (each 128-byte aligned):
//!   [16-byte block header][payload][padding]
//! ```
//!
//! A block whose size field is `32000` stores its payload raw; any other value
//! is the length of a raw DEFLATE stream.

mod builder;
mod error;
mod header;
mod reader;

pub use builder::{
    BINARY_BLOCK_SIZE, MIN_TEXTURE_LEN, TEXTURE_BLOCK_SIZE, build_binary, build_entry,
    build_texture,
};
pub use error::{ContainerError, ContainerResult};
pub use header::{
    ALIGNMENT, BlockHeader, BlockTableEntry, EntryHeader, EntryKind, MipEntry, STORED_MARKER,
};
pub use reader::{decode, decode_entry};
