//! Entry builders
//!
//! Both builders store every block raw; nothing here compresses.

use binrw::BinWrite;
use binrw::io::Cursor;

use super::error::{ContainerError, ContainerResult};
use super::header::{
    ALIGNMENT, BLOCK_TABLE_ENTRY_SIZE, BlockHeader, BlockTableEntry, ENTRY_HEADER_SIZE,
    EntryHeader, EntryKind, MIP_ENTRY_SIZE, MipEntry, stored_block_size,
};
use crate::align_up;

/// Payload bytes per binary block
pub const BINARY_BLOCK_SIZE: usize = 16_000;

/// Payload bytes per texture block
pub const TEXTURE_BLOCK_SIZE: usize = 16_384;

/// Inputs shorter than this are never treated as textures
pub const MIN_TEXTURE_LEN: usize = 0x50;

/// Offset of the mip count in a texture file header
const TEX_MIP_COUNT: usize = 0x12;

/// Offset of the per-level surface offsets in a texture file header
const TEX_SURFACE_OFFSETS: usize = 0x1C;

/// Highest plausible mip count
const MAX_MIP_COUNT: usize = 20;

/// Encode `data` as an entry of the requested kind
///
/// Texture requests for inputs shorter than a texture header fall back to a
/// binary entry.
pub fn build_entry(data: &[u8], kind: EntryKind) -> ContainerResult<Vec<u8>> {
    match kind {
        EntryKind::Texture => build_texture(data),
        _ => build_binary(data),
    }
}

/// Encode `data` as a binary entry
///
/// The data is split into 16,000-byte blocks; empty input still gets one
/// (empty) block.
pub fn build_binary(data: &[u8]) -> ContainerResult<Vec<u8>> {
    let block_count = data.len().div_ceil(BINARY_BLOCK_SIZE).max(1);
    let header_size = align_up(ENTRY_HEADER_SIZE + block_count * BLOCK_TABLE_ENTRY_SIZE, ALIGNMENT);

    let mut table = Cursor::new(Vec::with_capacity(block_count * BLOCK_TABLE_ENTRY_SIZE));
    let mut body = Vec::new();
    for index in 0..block_count {
        let start = index * BINARY_BLOCK_SIZE;
        let end = (start + BINARY_BLOCK_SIZE).min(data.len());
        let chunk = &data[start.min(end)..end];

        let offset = body.len();
        let stored = write_stored_block(&mut body, chunk)?;
        BlockTableEntry {
            offset: offset as u32,
            stored_size: stored as u16,
            decoded_size: chunk.len() as u16,
        }
        .write(&mut table)?;
    }

    let units = (body.len() / ALIGNMENT) as u32;
    let header = EntryHeader {
        header_size: header_size as u32,
        kind: EntryKind::Binary as u32,
        uncompressed_size: data.len() as u32,
        allocated_units: units,
        body_units: units,
        block_count: block_count as u32,
    };

    let mut out = Cursor::new(Vec::with_capacity(header_size + body.len()));
    header.write(&mut out)?;
    let mut out = out.into_inner();
    out.extend_from_slice(&table.into_inner());
    out.resize(header_size, 0);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Encode a texture file as a texture entry
///
/// The raw texture header is stored verbatim ahead of the pixel blocks and
/// padded so the first block is 128-byte aligned. Its first surface offset
/// is rewritten to the padded length.
pub fn build_texture(data: &[u8]) -> ContainerResult<Vec<u8>> {
    if data.len() < MIN_TEXTURE_LEN {
        return build_binary(data);
    }

    let tex_header_size = read_u32(data, TEX_SURFACE_OFFSETS)? as usize;
    let mut mip_count = usize::from(u16::from_le_bytes([
        data[TEX_MIP_COUNT],
        data[TEX_MIP_COUNT + 1],
    ]));
    if mip_count == 0 || mip_count > MAX_MIP_COUNT {
        mip_count = 1;
    }
    if tex_header_size < MIN_TEXTURE_LEN || tex_header_size > data.len() {
        return Err(ContainerError::InvalidTexture(format!(
            "header size 0x{tex_header_size:X} outside 0x{MIN_TEXTURE_LEN:X}..=0x{:X}",
            data.len()
        )));
    }

    let mut body = Vec::new();
    let mut mips = Vec::with_capacity(mip_count);
    let mut block_sizes: Vec<u16> = Vec::new();

    for level in 0..mip_count {
        let start = read_u32(data, TEX_SURFACE_OFFSETS + level * 4)? as usize;
        let end = if level + 1 < mip_count {
            read_u32(data, TEX_SURFACE_OFFSETS + (level + 1) * 4)? as usize
        } else {
            data.len()
        };
        if start < tex_header_size || end < start || end > data.len() {
            return Err(ContainerError::InvalidTexture(format!(
                "mip {level} spans 0x{start:X}..0x{end:X} in a 0x{:X}-byte file",
                data.len()
            )));
        }

        let level_start = body.len();
        let first_block = block_sizes.len();
        for chunk in data[start..end].chunks(TEXTURE_BLOCK_SIZE) {
            let stored = write_stored_block(&mut body, chunk)?;
            block_sizes.push(stored as u16);
        }

        mips.push(MipEntry {
            offset: level_start as u32,
            stored_size: (body.len() - level_start) as u32,
            decoded_size: (end - start) as u32,
            first_block: first_block as u32,
            block_count: (block_sizes.len() - first_block) as u32,
        });
    }

    let header_area = ENTRY_HEADER_SIZE + mip_count * MIP_ENTRY_SIZE + block_sizes.len() * 2;
    let header_size = align_up(header_area, ALIGNMENT);
    let blocks_start = align_up(header_size + tex_header_size, ALIGNMENT);
    let padded_tex_header = blocks_start - header_size;

    for mip in &mut mips {
        mip.offset += padded_tex_header as u32;
    }
    let decoded_total: u32 = mips.iter().map(|m| m.decoded_size).sum();
    let entry_size = align_up(blocks_start + body.len(), ALIGNMENT);

    let header = EntryHeader {
        header_size: header_size as u32,
        kind: EntryKind::Texture as u32,
        uncompressed_size: padded_tex_header as u32 + decoded_total,
        allocated_units: (entry_size / ALIGNMENT) as u32,
        body_units: ((padded_tex_header + body.len()) / ALIGNMENT) as u32,
        block_count: mip_count as u32,
    };

    let mut out = Cursor::new(Vec::with_capacity(blocks_start + body.len()));
    header.write(&mut out)?;
    for mip in &mips {
        mip.write(&mut out)?;
    }
    for size in &block_sizes {
        size.write_le(&mut out)?;
    }
    let mut out = out.into_inner();
    out.resize(header_size, 0);

    out.extend_from_slice(&data[..tex_header_size]);
    out.resize(blocks_start, 0);
    let surface_field = header_size + TEX_SURFACE_OFFSETS;
    out[surface_field..surface_field + 4].copy_from_slice(&(padded_tex_header as u32).to_le_bytes());

    out.extend_from_slice(&body);
    Ok(out)
}

/// Append one raw block for `chunk` and return its on-disk size
fn write_stored_block(body: &mut Vec<u8>, chunk: &[u8]) -> ContainerResult<usize> {
    let stored = stored_block_size(chunk.len());
    let start = body.len();

    let mut cursor = Cursor::new(Vec::with_capacity(16));
    BlockHeader::stored(chunk.len() as u32).write(&mut cursor)?;
    body.extend_from_slice(&cursor.into_inner());
    body.extend_from_slice(chunk);
    body.resize(start + stored, 0);
    Ok(stored)
}

fn read_u32(data: &[u8], pos: usize) -> ContainerResult<u32> {
    data.get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| ContainerError::InvalidTexture(format!("header truncated at 0x{pos:X}")))
}
