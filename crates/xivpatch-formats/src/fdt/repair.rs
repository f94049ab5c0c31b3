//! Kerning pointer repair
//!
//! Hand-edited font tables often change the glyph count without moving the
//! kerning block. The game reads the kerning header through the pointer at
//! `0x0C`, which must equal the end of the glyph array.

use tracing::{debug, warn};

use super::{FdtResult, FontTable, GLYPH_COUNT_FIELD, GLYPH_SIZE, HEADER_SIZE, KERNING_POINTER_FIELD};

/// Kerning block magic
pub const KERNING_MAGIC: [u8; 4] = *b"knhd";

/// Kerning header with no pairs
pub const EMPTY_KERNING_BLOCK: [u8; 16] = *b"knhd\0\0\0\0\0\0\0\0\0\0\0\0";

/// Check if the kerning pointer or block of `data` is inconsistent
pub fn needs_repair(data: &[u8]) -> bool {
    if data.len() < HEADER_SIZE {
        return false;
    }
    let field = |pos: usize| {
        u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize
    };
    let expected = HEADER_SIZE + field(GLYPH_COUNT_FIELD) * GLYPH_SIZE;
    field(KERNING_POINTER_FIELD) != expected
        || data.get(expected..expected + 4) != Some(&KERNING_MAGIC[..])
}

/// Make the kerning pointer point at a kerning block right behind the glyphs
///
/// A `knhd` block at the pointer is kept. Otherwise the first `knhd` behind
/// the glyph array is moved to the end of the array, dropping whatever sat
/// in between; without one, an empty block is appended. Consistent tables
/// come back unchanged.
pub fn repair(data: &[u8]) -> FdtResult<Vec<u8>> {
    if !needs_repair(data) {
        return Ok(data.to_vec());
    }

    let mut table = FontTable::parse(data)?;
    if !table.kerning.starts_with(&KERNING_MAGIC) {
        let table_end = HEADER_SIZE + table.glyphs.len() * GLYPH_SIZE;
        let trailing = &data[table_end..];
        match find_magic(trailing) {
            Some(start) => {
                if start > 0 {
                    warn!(
                        "Discarding {} bytes ({} glyph records) before the kerning block",
                        start,
                        start / GLYPH_SIZE
                    );
                }
                table.kerning = trailing[start..].to_vec();
            }
            None => {
                debug!("No kerning block found, appending an empty one");
                table.kerning = EMPTY_KERNING_BLOCK.to_vec();
            }
        }
    }
    table.to_bytes()
}
