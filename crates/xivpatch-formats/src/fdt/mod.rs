//! Font definition tables (`.fdt`)
//!
//! ```text
//! [0x00] header (0x40 bytes, little-endian)
//!        [0x0C] kerning block pointer  [0x24] glyph count
//!        [0x30] scale                  [0x38] texture count
//! [0x40] glyphs, 16 bytes each, ascending by code point
//! [....] kerning block ("knhd" header + pairs) to end of file
//! ```
//!
//! The game binary-searches the glyph array, so every writer here keeps it
//! sorted and rewrites the count and kerning pointer to match.

mod error;
mod merge;
mod repair;

pub use error::{FdtError, FdtResult};
pub use merge::{MergeOptions, MergeStrategy, merge, merge_bytes};
pub use repair::{EMPTY_KERNING_BLOCK, KERNING_MAGIC, needs_repair, repair};

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Size of the fixed header
pub const HEADER_SIZE: usize = 0x40;

/// Size of one glyph record
pub const GLYPH_SIZE: usize = 16;

/// Header field: kerning block pointer
pub const KERNING_POINTER_FIELD: usize = 0x0C;

/// Header field: glyph count
pub const GLYPH_COUNT_FIELD: usize = 0x24;

/// Header field: coordinate scale
pub const SCALE_FIELD: usize = 0x30;

/// Header field: texture count
pub const TEXTURE_COUNT_FIELD: usize = 0x38;

/// Scale of low-resolution tables
pub const SCALE_1K: u32 = 0x0400_0400;

/// Scale of high-resolution tables
pub const SCALE_4K: u32 = 0x1000_1000;

/// One glyph record
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct GlyphEntry {
    /// UTF-8 bytes of the character packed into an integer
    pub code_point: u32,
    /// Horizontal advance
    pub advance: u16,
    /// Texture slot holding the glyph image
    pub texture_slot: u16,
    /// Left edge in the texture
    pub u: u16,
    /// Top edge in the texture
    pub v: u16,
    /// Glyph width
    pub width: u8,
    /// Glyph height
    pub height: u8,
    /// Horizontal draw offset
    pub offset_x: i8,
    /// Vertical draw offset
    pub offset_y: i8,
}

/// Decoded font table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontTable {
    /// Fixed header bytes, kept verbatim apart from the fields this crate owns
    pub header: [u8; HEADER_SIZE],
    /// Glyphs in file order
    pub glyphs: Vec<GlyphEntry>,
    /// Kerning block bytes
    pub kerning: Vec<u8>,
}

impl FontTable {
    /// Decode a table
    ///
    /// The glyph count is clipped to the records actually present. The kerning
    /// block is taken from the kerning pointer when it lies behind the glyph
    /// array, and from the end of the glyph array otherwise.
    pub fn parse(data: &[u8]) -> FdtResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(FdtError::TooShort(data.len()));
        }
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&data[..HEADER_SIZE]);

        let declared = read_u32(&header, GLYPH_COUNT_FIELD) as usize;
        let available = (data.len() - HEADER_SIZE) / GLYPH_SIZE;
        let count = declared.min(available);
        let table_end = HEADER_SIZE + count * GLYPH_SIZE;

        let mut cursor = Cursor::new(&data[HEADER_SIZE..table_end]);
        let glyphs = (0..count)
            .map(|_| GlyphEntry::read(&mut cursor))
            .collect::<Result<Vec<_>, _>>()?;

        let pointer = read_u32(&header, KERNING_POINTER_FIELD) as usize;
        let kerning_start = if pointer >= table_end && pointer < data.len() {
            pointer
        } else {
            table_end
        };

        Ok(Self {
            header,
            glyphs,
            kerning: data[kerning_start..].to_vec(),
        })
    }

    /// Encode the table, rewriting glyph count and kerning pointer
    pub fn to_bytes(&self) -> FdtResult<Vec<u8>> {
        let table_end = HEADER_SIZE + self.glyphs.len() * GLYPH_SIZE;
        let mut header = self.header;
        write_u32(&mut header, GLYPH_COUNT_FIELD, self.glyphs.len() as u32);
        write_u32(&mut header, KERNING_POINTER_FIELD, table_end as u32);

        let mut out = Cursor::new(Vec::with_capacity(table_end + self.kerning.len()));
        header.write_le(&mut out)?;
        for glyph in &self.glyphs {
            glyph.write(&mut out)?;
        }
        let mut out = out.into_inner();
        out.extend_from_slice(&self.kerning);
        Ok(out)
    }

    /// Coordinate scale field
    pub fn scale(&self) -> u32 {
        read_u32(&self.header, SCALE_FIELD)
    }

    /// Set the coordinate scale field
    pub fn set_scale(&mut self, scale: u32) {
        write_u32(&mut self.header, SCALE_FIELD, scale);
    }

    /// Texture count field
    pub fn texture_count(&self) -> u32 {
        read_u32(&self.header, TEXTURE_COUNT_FIELD)
    }

    /// Set the texture count field
    pub fn set_texture_count(&mut self, count: u32) {
        write_u32(&mut self.header, TEXTURE_COUNT_FIELD, count);
    }

    /// Glyph for `code_point`, by binary search
    pub fn glyph(&self, code_point: u32) -> Option<&GlyphEntry> {
        self.glyphs
            .binary_search_by_key(&code_point, |g| g.code_point)
            .ok()
            .map(|i| &self.glyphs[i])
    }
}

fn read_u32(header: &[u8; HEADER_SIZE], pos: usize) -> u32 {
    u32::from_le_bytes([
        header[pos],
        header[pos + 1],
        header[pos + 2],
        header[pos + 3],
    ])
}

fn write_u32(header: &mut [u8; HEADER_SIZE], pos: usize, value: u32) {
    header[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}
