//! Entry header, block table and block header structures

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

use super::error::{ContainerError, ContainerResult};
use crate::align_up;

/// Alignment of entry headers, blocks and whole entries
pub const ALIGNMENT: usize = 128;

/// Size of the fixed entry header fields
pub const ENTRY_HEADER_SIZE: usize = 24;

/// Size of one binary block table record
pub const BLOCK_TABLE_ENTRY_SIZE: usize = 8;

/// Size of one texture mip table record
pub const MIP_ENTRY_SIZE: usize = 20;

/// Size of the header in front of every block
pub const BLOCK_HEADER_SIZE: usize = 16;

/// Block size field value meaning "payload stored raw"
pub const STORED_MARKER: u32 = 32000;

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EntryKind {
    /// Payload stored whole after the header
    Empty = 1,
    /// Generic block-table entry
    Binary = 2,
    /// Model entry, decoded like a binary one
    Model = 3,
    /// Texture entry with a mip table
    Texture = 4,
}

impl EntryKind {
    /// Parse from the raw header field
    pub fn from_u32(value: u32) -> ContainerResult<Self> {
        match value {
            1 => Ok(Self::Empty),
            2 => Ok(Self::Binary),
            3 => Ok(Self::Model),
            4 => Ok(Self::Texture),
            other => Err(ContainerError::UnknownKind(other)),
        }
    }
}

/// Fixed part of every entry header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct EntryHeader {
    /// Size of the whole header area, a multiple of 128
    pub header_size: u32,
    /// Raw [`EntryKind`]
    pub kind: u32,
    /// Size of the decoded payload
    pub uncompressed_size: u32,
    /// Allocation size in 128-byte units
    pub allocated_units: u32,
    /// Bytes stored after the header area, in 128-byte units
    pub body_units: u32,
    /// Block count (binary) or mip count (texture)
    pub block_count: u32,
}

impl EntryHeader {
    /// Read the header at the start of `data`
    pub fn parse(data: &[u8]) -> ContainerResult<Self> {
        Ok(Self::read(&mut Cursor::new(data))?)
    }

    /// Parsed entry kind
    pub fn entry_kind(&self) -> ContainerResult<EntryKind> {
        EntryKind::from_u32(self.kind)
    }

    /// Check the header size is usable
    pub fn validate(&self) -> ContainerResult<()> {
        let size = self.header_size as usize;
        if size < ENTRY_HEADER_SIZE || size % ALIGNMENT != 0 {
            return Err(ContainerError::InvalidHeaderSize(self.header_size));
        }
        Ok(())
    }

    /// Bytes the entry occupies in the body file
    pub fn stored_len(&self) -> u64 {
        u64::from(self.header_size) + u64::from(self.body_units) * ALIGNMENT as u64
    }
}

/// Binary block table record
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BlockTableEntry {
    /// Block offset from the end of the header area
    pub offset: u32,
    /// Block size on disk, header and padding included
    pub stored_size: u16,
    /// Decoded payload size
    pub decoded_size: u16,
}

/// Texture mip table record
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct MipEntry {
    /// Offset of the first block from the end of the header area
    pub offset: u32,
    /// Bytes of all blocks of this level on disk
    pub stored_size: u32,
    /// Decoded bytes of this level
    pub decoded_size: u32,
    /// Index of the first block in the block size table
    pub first_block: u32,
    /// Number of blocks of this level
    pub block_count: u32,
}

/// Header in front of every block
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BlockHeader {
    /// Always 16
    pub header_size: u32,
    /// Always 0
    pub reserved: u32,
    /// [`STORED_MARKER`] for raw payloads, else the DEFLATE stream length
    pub stored_size: u32,
    /// Decoded payload size
    pub decoded_size: u32,
}

impl BlockHeader {
    /// Header of a raw block carrying `len` bytes
    pub const fn stored(len: u32) -> Self {
        Self {
            header_size: BLOCK_HEADER_SIZE as u32,
            reserved: 0,
            stored_size: STORED_MARKER,
            decoded_size: len,
        }
    }

    /// Check if the payload follows uncompressed
    pub const fn is_stored(&self) -> bool {
        self.stored_size == STORED_MARKER
    }
}

/// On-disk size of a raw block carrying `len` bytes
pub const fn stored_block_size(len: usize) -> usize {
    align_up(len + BLOCK_HEADER_SIZE, ALIGNMENT)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_header_layout() {
        let header = EntryHeader {
            header_size: 128,
            kind: 2,
            uncompressed_size: 5,
            allocated_units: 1,
            body_units: 1,
            block_count: 1,
        };
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).expect("write");
        let bytes = cursor.into_inner();

        assert_eq!(bytes.len(), ENTRY_HEADER_SIZE);
        assert_eq!(&bytes[0..4], &128u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &1u32.to_le_bytes());
        assert_eq!(header.stored_len(), 256);
        assert_eq!(header.entry_kind().expect("kind"), EntryKind::Binary);
    }

    #[test]
    fn test_header_validation() {
        let mut header = EntryHeader {
            header_size: 100,
            kind: 9,
            uncompressed_size: 0,
            allocated_units: 0,
            body_units: 0,
            block_count: 0,
        };
        assert!(matches!(
            header.validate(),
            Err(ContainerError::InvalidHeaderSize(100))
        ));
        assert!(matches!(
            header.entry_kind(),
            Err(ContainerError::UnknownKind(9))
        ));
        header.header_size = 256;
        assert!(header.validate().is_ok());
    }

    #[test]
    fn test_stored_block_size() {
        assert_eq!(stored_block_size(0), 128);
        assert_eq!(stored_block_size(112), 128);
        assert_eq!(stored_block_size(113), 256);
        assert_eq!(stored_block_size(16_000), 16_128);
        assert_eq!(stored_block_size(16_384), 16_512);
    }
}
