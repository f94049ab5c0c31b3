//! Entry decoder
//!
//! Decoding never trusts the block table further than the underlying source
//! reaches: a block that would start past the end stops the walk and the
//! bytes decoded so far are returned.

use binrw::BinRead;
use binrw::io::{Cursor, Read, Seek, SeekFrom};
use flate2::read::DeflateDecoder;
use tracing::{debug, warn};

use super::error::{ContainerError, ContainerResult};
use super::header::{
    BLOCK_HEADER_SIZE, BlockHeader, BlockTableEntry, ENTRY_HEADER_SIZE, EntryHeader, EntryKind,
    MipEntry,
};

/// Decode the entry that starts at `entry_start` in `reader`
pub fn decode_entry<R: Read + Seek>(reader: &mut R, entry_start: u64) -> ContainerResult<Vec<u8>> {
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(entry_start))?;
    let header = EntryHeader::read(reader)?;

    if header.header_size == 0 || header.uncompressed_size == 0 {
        return Ok(Vec::new());
    }
    header.validate()?;

    let mut source = Source {
        reader,
        end,
        body_start: entry_start + u64::from(header.header_size),
    };
    let declared = header.uncompressed_size as usize;

    let out = match header.entry_kind()? {
        EntryKind::Empty => source.read_at(source.body_start, declared)?,
        EntryKind::Binary | EntryKind::Model => {
            let table = read_table::<_, BlockTableEntry>(
                source.reader,
                entry_start + ENTRY_HEADER_SIZE as u64,
                header.block_count,
            )?;
            let mut out = Vec::with_capacity(source.capacity_hint(source.body_start, declared));
            for entry in table {
                let position = source.body_start + u64::from(entry.offset);
                if !source.decode_block(position, declared - out.len(), &mut out)? {
                    break;
                }
            }
            out
        }
        EntryKind::Texture => decode_texture(&mut source, &header, entry_start)?,
    };

    if out.len() < declared {
        warn!(
            "Entry at 0x{:X} decoded {} of {} declared bytes",
            entry_start,
            out.len(),
            declared
        );
    }
    Ok(out)
}

/// Decode an entry held in memory
pub fn decode(bytes: &[u8]) -> ContainerResult<Vec<u8>> {
    decode_entry(&mut Cursor::new(bytes), 0)
}

fn decode_texture<R: Read + Seek>(
    source: &mut Source<'_, R>,
    header: &EntryHeader,
    entry_start: u64,
) -> ContainerResult<Vec<u8>> {
    let declared = header.uncompressed_size as usize;
    let mips = read_table::<_, MipEntry>(
        source.reader,
        entry_start + ENTRY_HEADER_SIZE as u64,
        header.block_count,
    )?;
    let block_total = mips
        .iter()
        .fold(0u32, |total, m| total.saturating_add(m.block_count));
    let sizes_start = source.reader.stream_position()?;
    let block_sizes = read_table::<_, u16>(source.reader, sizes_start, block_total)?;

    let raw_header_len = mips.first().map_or(0, |m| m.offset as usize).min(declared);
    let mut out = source.read_at(source.body_start, raw_header_len)?;

    'levels: for mip in &mips {
        let mut position = source.body_start + u64::from(mip.offset);
        let first = mip.first_block as usize;
        for index in first..first.saturating_add(mip.block_count as usize) {
            if !source.decode_block(position, declared - out.len(), &mut out)? {
                break 'levels;
            }
            let Some(&size) = block_sizes.get(index) else {
                debug!("Block size table ends at {}", index);
                break 'levels;
            };
            position += u64::from(size);
        }
    }
    Ok(out)
}

fn read_table<R, T>(reader: &mut R, position: u64, count: u32) -> ContainerResult<Vec<T>>
where
    R: Read + Seek,
    T: for<'a> BinRead<Args<'a> = ()>,
{
    reader.seek(SeekFrom::Start(position))?;
    (0..count)
        .map(|_| T::read_le(reader).map_err(ContainerError::from))
        .collect()
}

struct Source<'r, R> {
    reader: &'r mut R,
    end: u64,
    body_start: u64,
}

impl<R: Read + Seek> Source<'_, R> {
    /// `len` capped at the input left after `position`
    ///
    /// Sizes come from headers that may be corrupt, so buffers are never
    /// reserved beyond what the input can fill.
    fn capacity_hint(&self, position: u64, len: usize) -> usize {
        let available = self.end.saturating_sub(position);
        usize::try_from(available).map_or(len, |available| len.min(available))
    }

    /// Read up to `len` bytes at `position`, short at end of input
    fn read_at(&mut self, position: u64, len: usize) -> ContainerResult<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(position))?;
        let mut buf = Vec::with_capacity(self.capacity_hint(position, len));
        (&mut *self.reader).take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Decode the block at `position` into `out`, at most `remaining` bytes
    ///
    /// Returns `false` when the block lies past the end of the input.
    fn decode_block(
        &mut self,
        position: u64,
        remaining: usize,
        out: &mut Vec<u8>,
    ) -> ContainerResult<bool> {
        if position + BLOCK_HEADER_SIZE as u64 > self.end {
            debug!("Block at 0x{:X} lies past the end of input", position);
            return Ok(false);
        }
        self.reader.seek(SeekFrom::Start(position))?;
        let block = BlockHeader::read(self.reader)?;
        let want = (block.decoded_size as usize).min(remaining);

        if block.is_stored() {
            let payload = self.read_at(position + BLOCK_HEADER_SIZE as u64, want)?;
            out.extend_from_slice(&payload);
        } else {
            let compressed =
                self.read_at(position + BLOCK_HEADER_SIZE as u64, block.stored_size as usize)?;
            let mut decoder = DeflateDecoder::new(compressed.as_slice()).take(want as u64);
            let mut payload = Vec::with_capacity(want.min(compressed.len().saturating_mul(4)));
            decoder
                .read_to_end(&mut payload)
                .map_err(|e| ContainerError::DecompressionFailed(e.to_string()))?;
            out.extend_from_slice(&payload);
        }
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::super::builder::{build_binary, build_texture};
    use super::*;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_binary_round_trip_lengths() {
        for len in [0usize, 1, 16_000, 16_001, 32_005] {
            let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let entry = build_binary(&data).expect("build");
            assert_eq!(decode(&entry).expect("decode"), data, "length {len}");
        }
    }

    #[test]
    fn test_decode_at_offset_in_larger_stream() {
        let data = b"payload inside a body file".to_vec();
        let mut body = vec![0xEE; 384];
        body.extend(build_binary(&data).expect("build"));
        body.extend(vec![0xEE; 128]);

        let decoded = decode_entry(&mut Cursor::new(body), 384).expect("decode");
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_compressed_block() {
        let payload = b"compressed compressed compressed compressed".repeat(10);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).expect("write");
        let compressed = encoder.finish().expect("finish");

        let mut entry = vec![0u8; 128];
        entry[0..4].copy_from_slice(&128u32.to_le_bytes());
        entry[4..8].copy_from_slice(&2u32.to_le_bytes());
        entry[8..12].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        entry[20..24].copy_from_slice(&1u32.to_le_bytes());
        entry[28..30].copy_from_slice(&(16 + compressed.len() as u16).to_le_bytes());
        entry[30..32].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        entry.extend_from_slice(&16u32.to_le_bytes());
        entry.extend_from_slice(&0u32.to_le_bytes());
        entry.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        entry.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        entry.extend_from_slice(&compressed);

        assert_eq!(decode(&entry).expect("decode"), payload);
    }

    #[test]
    fn test_whole_entry_kind() {
        let mut entry = vec![0u8; 128];
        entry[0..4].copy_from_slice(&128u32.to_le_bytes());
        entry[4..8].copy_from_slice(&1u32.to_le_bytes());
        entry[8..12].copy_from_slice(&4u32.to_le_bytes());
        entry.extend_from_slice(b"rawXtrailing");

        assert_eq!(decode(&entry).expect("decode"), b"rawX");
    }

    #[test]
    fn test_truncated_input_stops_gracefully() {
        let data = vec![0x11; 40_000];
        let mut entry = build_binary(&data).expect("build");
        // Keep the header, the first block and half of the second
        entry.truncate(128 + 16_128 + 8_000);

        let decoded = decode(&entry).expect("decode");
        assert!(decoded.len() >= 16_000);
        assert!(decoded.len() < data.len());
        assert!(decoded.iter().all(|&b| b == 0x11));
    }

    #[test]
    fn test_oversized_declared_length_is_bounded_by_input() {
        let data = vec![0x5A; 100];
        let mut entry = build_binary(&data).expect("build");
        assert_eq!(entry.len(), 256);
        entry[8..12].copy_from_slice(&u32::MAX.to_le_bytes());

        assert_eq!(decode(&entry).expect("decode"), data);

        // Whole-entry kind reads straight from the declared length
        entry[4..8].copy_from_slice(&1u32.to_le_bytes());
        let raw = decode(&entry).expect("decode");
        assert_eq!(raw.len(), 256 - 128);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let mut entry = vec![0u8; 128];
        entry[0..4].copy_from_slice(&128u32.to_le_bytes());
        entry[4..8].copy_from_slice(&7u32.to_le_bytes());
        entry[8..12].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(decode(&entry), Err(ContainerError::UnknownKind(7))));
    }

    #[test]
    fn test_texture_round_trip() {
        let mut tex = vec![0u8; 0x50];
        tex[0x12] = 2;
        tex[0x1C..0x20].copy_from_slice(&0x50u32.to_le_bytes());
        tex[0x20..0x24].copy_from_slice(&(0x50u32 + 20_000).to_le_bytes());
        tex.extend((0..20_000).map(|i| (i % 7) as u8));
        tex.extend(std::iter::repeat_n(9u8, 300));

        let entry = build_texture(&tex).expect("build");
        let decoded = decode(&entry).expect("decode");

        // Header padded from 0x50 to 0x80, pixels unchanged behind it
        assert_eq!(decoded.len(), 0x80 + 20_300);
        assert_eq!(&decoded[..0x1C], &tex[..0x1C]);
        assert_eq!(&decoded[0x1C..0x20], &0x80u32.to_le_bytes());
        assert_eq!(&decoded[0x80..], &tex[0x50..]);
    }

    proptest! {
        #[test]
        fn prop_binary_round_trip(data in proptest::collection::vec(any::<u8>(), 0..40_000)) {
            let entry = build_binary(&data).expect("build");
            prop_assert_eq!(entry.len() % 128, 0);
            prop_assert_eq!(decode(&entry).expect("decode"), data);
        }
    }
}
