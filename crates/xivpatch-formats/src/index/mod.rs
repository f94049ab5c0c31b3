//! Index files (`.index` / `.index2`)
//!
//! An index file is a descriptor header followed by segments. Segment 0 is
//! a table of fixed-size records sorted ascending by key:
//!
//! ```text
//! Primary (.index, 16 bytes):  [address u64][locator u32][reserved u32]
//! Secondary (.index2, 8 bytes): [file hash u32][locator u32]
//! ```
//!
//! The primary key is the full 64-bit [`EntryAddress`]; the secondary table
//! is keyed by the file name hash alone. Segment 3 of a primary index records,
//! for every parent path hash, where its contiguous run of records starts and
//! how long it is.
//!
//! [`IndexBuffer`] holds a whole file in memory. Lookups are binary searches;
//! [`IndexBuffer::upsert`] updates a locator in place or grows the file by
//! one record, re-basing every displaced segment and refreshing checksums.

mod checksum;
mod error;
pub mod layout;
mod mutate;

pub use checksum::adler32;
pub use error::{IndexError, IndexResult};
pub use layout::SegmentDescriptor;
pub use mutate::Upsert;

use crate::hash::EntryAddress;
use layout::{MIN_SEGMENT_OFFSET, read_u32, read_u64};
use std::fmt;

/// Alignment of every entry appended to a body file
pub const ENTRY_ALIGNMENT: u64 = 128;

/// Which of the two index files a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKind {
    /// `.index`: keyed by the full address
    Primary,
    /// `.index2`: keyed by the file name hash
    Secondary,
}

impl IndexKind {
    /// Size of one segment 0 record
    pub const fn record_size(self) -> usize {
        match self {
            Self::Primary => 16,
            Self::Secondary => 8,
        }
    }

    /// File name suffix after `<domain>.win32`
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Primary => "index",
            Self::Secondary => "index2",
        }
    }

    /// Sort key of `address` in this kind of table
    pub const fn key_of(self, address: EntryAddress) -> u64 {
        match self {
            Self::Primary => address.to_u64(),
            Self::Secondary => address.file_hash as u64,
        }
    }
}

/// Packed body file location
///
/// Bits 0-2 select the body file (`.dat0` to `.dat7`); the remaining bits,
/// shifted left by 3, are the byte offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator(u32);

impl Locator {
    /// Pack a body file index and a 128-byte aligned offset
    pub fn new(body_index: u8, offset: u64) -> IndexResult<Self> {
        if body_index > 7 {
            return Err(IndexError::InvalidBodyIndex(body_index));
        }
        if offset % ENTRY_ALIGNMENT != 0 {
            return Err(IndexError::UnalignedOffset(offset));
        }
        let shifted = u32::try_from(offset >> 3).map_err(|_| IndexError::OffsetTooLarge(offset))?;
        Ok(Self(shifted | u32::from(body_index)))
    }

    /// Wrap a raw locator read from an index
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw packed value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Body file number
    pub const fn body_index(self) -> u8 {
        (self.0 & 0x7) as u8
    }

    /// Byte offset inside the body file
    pub const fn offset(self) -> u64 {
        ((self.0 & !0x7) as u64) << 3
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dat{}@0x{:X}", self.body_index(), self.offset())
    }
}

/// One segment 0 record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Sort key (full address for primary, file hash for secondary)
    pub key: u64,
    /// Where the entry lives
    pub locator: Locator,
}

/// A whole index file held in memory
#[derive(Debug, Clone)]
pub struct IndexBuffer {
    data: Vec<u8>,
    kind: IndexKind,
}

impl IndexBuffer {
    /// Wrap and validate the bytes of an index file
    pub fn from_bytes(data: Vec<u8>, kind: IndexKind) -> IndexResult<Self> {
        let buffer = Self { data, kind };
        buffer.primary_descriptor()?;
        Ok(buffer)
    }

    /// Which index file this is
    pub const fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Raw file bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume into raw file bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Descriptor of `segment`, if present in the header
    pub fn segment(&self, segment: usize) -> Option<SegmentDescriptor> {
        SegmentDescriptor::read_from(&self.data, segment)
    }

    /// Validated descriptor of the record segment
    pub fn primary_descriptor(&self) -> IndexResult<SegmentDescriptor> {
        let descriptor = self.segment(0).ok_or(IndexError::TooShort {
            len: self.data.len(),
            min: layout::PRIMARY_DESCRIPTOR + layout::DESCRIPTOR_SIZE,
        })?;
        if (descriptor.offset as usize) < MIN_SEGMENT_OFFSET {
            return Err(IndexError::SegmentInHeader {
                segment: 0,
                offset: descriptor.offset,
            });
        }
        if descriptor.end() > self.data.len() {
            return Err(IndexError::SegmentOutOfBounds {
                segment: 0,
                offset: descriptor.offset,
                size: descriptor.size,
                len: self.data.len(),
            });
        }
        if descriptor.size as usize % self.kind.record_size() != 0 {
            return Err(IndexError::MisalignedSegment {
                size: descriptor.size,
                record_size: self.kind.record_size(),
            });
        }
        Ok(descriptor)
    }

    /// Number of records in segment 0
    pub fn record_count(&self) -> usize {
        self.primary_descriptor()
            .map_or(0, |d| d.size as usize / self.kind.record_size())
    }

    /// Record at `position` in segment 0
    pub fn record(&self, position: usize) -> Option<IndexRecord> {
        let descriptor = self.primary_descriptor().ok()?;
        if position >= descriptor.size as usize / self.kind.record_size() {
            return None;
        }
        let pos = descriptor.offset as usize + position * self.kind.record_size();
        self.record_at(pos)
    }

    /// All segment 0 records in file order
    pub fn records(&self) -> impl Iterator<Item = IndexRecord> + '_ {
        let record_size = self.kind.record_size();
        let (start, count) = self
            .primary_descriptor()
            .map_or((0, 0), |d| (d.offset as usize, d.size as usize / record_size));
        (0..count).filter_map(move |i| self.record_at(start + i * record_size))
    }

    fn record_at(&self, pos: usize) -> Option<IndexRecord> {
        match self.kind {
            IndexKind::Primary => Some(IndexRecord {
                key: read_u64(&self.data, pos)?,
                locator: Locator::from_raw(read_u32(&self.data, pos + 8)?),
            }),
            IndexKind::Secondary => Some(IndexRecord {
                key: u64::from(read_u32(&self.data, pos)?),
                locator: Locator::from_raw(read_u32(&self.data, pos + 4)?),
            }),
        }
    }

    /// Binary search segment 0 for `key`
    ///
    /// `Ok(position)` on a hit, `Err(position)` with the insertion point on a miss.
    pub fn search(&self, key: u64) -> Result<usize, usize> {
        let mut low = 0;
        let mut high = self.record_count();
        while low < high {
            let mid = low + (high - low) / 2;
            match self.record(mid) {
                Some(record) if record.key < key => low = mid + 1,
                Some(record) if record.key == key => return Ok(mid),
                _ => high = mid,
            }
        }
        Err(low)
    }

    /// Locator of `address`, if indexed
    pub fn lookup(&self, address: EntryAddress) -> Option<Locator> {
        let position = self.search(self.kind.key_of(address)).ok()?;
        self.record(position).map(|r| r.locator)
    }

    /// Check the stored checksum of `segment` against its bytes
    pub fn verify_checksum(&self, segment: usize) -> bool {
        self.segment(segment).is_some_and(|d| {
            self.data
                .get(d.range())
                .is_some_and(|bytes| adler32(bytes) == d.checksum)
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::layout::{self, write_u32};
    use super::{IndexKind, adler32};

    /// Build an index file with the given sorted segment 0 records and an
    /// optional folder segment placed after it.
    pub fn build_index(
        kind: IndexKind,
        records: &[(u64, u32)],
        folders: &[(u32, u32, u32)],
    ) -> Vec<u8> {
        let mut data = vec![0u8; layout::MIN_SEGMENT_OFFSET];
        let seg0_offset = data.len();
        for &(key, locator) in records {
            match kind {
                IndexKind::Primary => {
                    data.extend_from_slice(&key.to_le_bytes());
                    data.extend_from_slice(&locator.to_le_bytes());
                    data.extend_from_slice(&0u32.to_le_bytes());
                }
                IndexKind::Secondary => {
                    data.extend_from_slice(&(key as u32).to_le_bytes());
                    data.extend_from_slice(&locator.to_le_bytes());
                }
            }
        }
        let seg0_size = data.len() - seg0_offset;

        // Segment 1: a small opaque table after the records
        let seg1_offset = data.len();
        data.extend_from_slice(&[0xAB; 32]);

        let folder_offset = data.len();
        for &(hash, offset, size) in folders {
            data.extend_from_slice(&hash.to_le_bytes());
            data.extend_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(&size.to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());
        }
        let folder_size = data.len() - folder_offset;

        write_u32(&mut data, 0x400, 0x400);
        write_u32(&mut data, layout::descriptor_offset(0), seg0_offset as u32);
        write_u32(&mut data, layout::size_field(0), seg0_size as u32);
        let seg0_sum = adler32(&data[seg0_offset..seg0_offset + seg0_size]);
        write_u32(&mut data, layout::checksum_field(0), seg0_sum);

        write_u32(&mut data, layout::descriptor_offset(1), seg1_offset as u32);
        write_u32(&mut data, layout::size_field(1), 32);

        if !folders.is_empty() {
            let folder = layout::FOLDER_SEGMENT;
            write_u32(&mut data, layout::descriptor_offset(folder), folder_offset as u32);
            write_u32(&mut data, layout::size_field(folder), folder_size as u32);
            let sum = adler32(&data[folder_offset..folder_offset + folder_size]);
            write_u32(&mut data, layout::checksum_field(folder), sum);
        }
        data
    }
}
