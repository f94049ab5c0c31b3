//! Fixed-position segment descriptor header
//!
//! ```text
//! [0x000] SqPack file header (0x400 bytes, untouched)
//! [0x400] Index header size
//! [0x408] Segment 0 descriptor (file records)
//! [0x454] Segment 1 descriptor, then one every 72 bytes up to segment 10
//! [0x800] Segment data
//! ```
//!
//! Each descriptor is `[offset u32][size u32][checksum u32][digest 20 bytes]`,
//! little-endian. The digest is never recomputed.

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Position of the segment 0 descriptor
pub const PRIMARY_DESCRIPTOR: usize = 0x408;

/// Base of the descriptors for segments 1 and up
pub const EXTRA_DESCRIPTOR_BASE: usize = 0x450;

/// Distance between consecutive descriptors for segments 1 and up
pub const DESCRIPTOR_STRIDE: usize = 72;

/// Number of segments described by the header
pub const SEGMENT_COUNT: usize = 11;

/// Segment holding per-folder runs of primary records
pub const FOLDER_SEGMENT: usize = 3;

/// Size of one folder segment record
pub const FOLDER_RECORD_SIZE: usize = 16;

/// Segments never start before the end of the descriptor header
pub const MIN_SEGMENT_OFFSET: usize = 0x800;

/// Bytes of a descriptor that this crate reads
pub const DESCRIPTOR_SIZE: usize = 32;

/// Position of the descriptor for `segment`
pub const fn descriptor_offset(segment: usize) -> usize {
    if segment == 0 {
        PRIMARY_DESCRIPTOR
    } else {
        EXTRA_DESCRIPTOR_BASE + (segment - 1) * DESCRIPTOR_STRIDE + 4
    }
}

/// Position of the size field of a descriptor
pub const fn size_field(segment: usize) -> usize {
    descriptor_offset(segment) + 4
}

/// Position of the checksum field of a descriptor
pub const fn checksum_field(segment: usize) -> usize {
    descriptor_offset(segment) + 8
}

/// Segment descriptor
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct SegmentDescriptor {
    /// Byte offset of the segment within the index file
    pub offset: u32,
    /// Byte length of the segment
    pub size: u32,
    /// Adler-32 of the segment bytes
    pub checksum: u32,
    /// Digest of the segment bytes (not maintained)
    pub digest: [u8; 20],
}

impl SegmentDescriptor {
    /// Read the descriptor for `segment`, if the header is long enough
    pub fn read_from(data: &[u8], segment: usize) -> Option<Self> {
        let start = descriptor_offset(segment);
        let bytes = data.get(start..start + DESCRIPTOR_SIZE)?;
        Self::read(&mut Cursor::new(bytes)).ok()
    }

    /// Byte range covered by the segment
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.end()
    }

    /// End offset of the segment
    pub fn end(&self) -> usize {
        self.offset as usize + self.size as usize
    }
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Option<u32> {
    data.get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
}

pub(crate) fn read_u64(data: &[u8], pos: usize) -> Option<u64> {
    data.get(pos..pos + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
}

pub(crate) fn write_u32(data: &mut [u8], pos: usize, value: u32) {
    data[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_positions() {
        assert_eq!(descriptor_offset(0), 0x408);
        assert_eq!(size_field(0), 0x40C);
        assert_eq!(checksum_field(0), 0x410);
        assert_eq!(descriptor_offset(1), 0x454);
        assert_eq!(descriptor_offset(2), 0x49C);
        assert_eq!(descriptor_offset(FOLDER_SEGMENT), 0x4E4);
        assert!(descriptor_offset(SEGMENT_COUNT - 1) + DESCRIPTOR_SIZE <= MIN_SEGMENT_OFFSET);
    }

    #[test]
    fn test_descriptor_read() {
        let mut data = vec![0u8; MIN_SEGMENT_OFFSET];
        write_u32(&mut data, 0x408, 0x800);
        write_u32(&mut data, 0x40C, 0x30);
        write_u32(&mut data, 0x410, 0xDEAD_BEEF);

        let descriptor = SegmentDescriptor::read_from(&data, 0).expect("descriptor");
        assert_eq!(descriptor.offset, 0x800);
        assert_eq!(descriptor.size, 0x30);
        assert_eq!(descriptor.checksum, 0xDEAD_BEEF);
        assert_eq!(descriptor.range(), 0x800..0x830);

        assert!(SegmentDescriptor::read_from(&data[..0x420], 3).is_none());
    }
}
