//! Sheet schema (`.exh`)
//!
//! ```text
//! [0x00] "EXHF"          [0x04] version
//! [0x06] fixed data size [0x08] column count
//! [0x0A] page count      [0x0C] language count
//! [0x20] columns: (type u16, offset u16) each
//!        pages:   (start id u32, row count u32) each
//!        languages: u16 each
//! ```
//!
//! All fields are big-endian.

mod error;

pub use error::{ExhError, ExhResult};

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, binrw};

/// Sheet schema magic
pub const EXH_MAGIC: [u8; 4] = *b"EXHF";

/// Primitive type of a sheet column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Offset into the row's string pool
    String,
    /// One byte, zero or one
    Bool,
    /// Signed byte
    Int8,
    /// Unsigned byte
    UInt8,
    /// Signed 16-bit
    Int16,
    /// Unsigned 16-bit
    UInt16,
    /// Signed 32-bit
    Int32,
    /// Unsigned 32-bit
    UInt32,
    /// IEEE single
    Float32,
    /// IEEE double (patch tables only)
    Float64,
    /// Signed 64-bit
    Int64,
    /// Unsigned 64-bit
    UInt64,
    /// One bit of a shared byte
    PackedBool(u8),
}

impl ColumnKind {
    /// Map a schema type code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x00 => Some(Self::String),
            0x01 => Some(Self::Bool),
            0x02 => Some(Self::Int8),
            0x03 => Some(Self::UInt8),
            0x04 => Some(Self::Int16),
            0x05 => Some(Self::UInt16),
            0x06 => Some(Self::Int32),
            0x07 => Some(Self::UInt32),
            0x09 => Some(Self::Float32),
            0x0A => Some(Self::Int64),
            0x0B => Some(Self::UInt64),
            0x19..=0x20 => Some(Self::PackedBool((code - 0x19) as u8)),
            _ => None,
        }
    }

    /// Map a type name from a patch table header, case-insensitively
    ///
    /// Packed booleans are written `bit&XX` with a hexadecimal mask.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if let Some(mask) = name.strip_prefix("bit&") {
            let mask = u8::from_str_radix(mask, 16).ok()?;
            return (mask.count_ones() == 1).then(|| Self::PackedBool(mask.trailing_zeros() as u8));
        }
        match name.as_str() {
            "str" | "string" => Some(Self::String),
            "bool" => Some(Self::Bool),
            "sbyte" | "int8" => Some(Self::Int8),
            "byte" | "uint8" => Some(Self::UInt8),
            "int16" => Some(Self::Int16),
            "uint16" => Some(Self::UInt16),
            "int32" => Some(Self::Int32),
            "uint32" => Some(Self::UInt32),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::UInt64),
            "float" | "single" => Some(Self::Float32),
            "double" => Some(Self::Float64),
            _ => None,
        }
    }

    /// Bytes the field occupies in the fixed row area
    pub const fn width(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 | Self::PackedBool(_) => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::String | Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }
}

/// One column of the fixed row area
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct ColumnDefinition {
    /// Raw type code
    pub type_code: u16,
    /// Byte offset inside the fixed row area
    pub offset: u16,
}

impl ColumnDefinition {
    /// Decoded column type, `None` for codes this crate does not write
    pub fn kind(&self) -> Option<ColumnKind> {
        ColumnKind::from_code(self.type_code)
    }
}

/// One page of rows, stored as its own sheet entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct PageRange {
    /// First row id of the page
    pub start_id: u32,
    /// Number of rows in the page
    pub row_count: u32,
}

/// Sheet schema
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSchema {
    /// Magic signature, always "EXHF"
    #[br(assert(magic == EXH_MAGIC, "invalid schema magic: {:?}", magic))]
    pub magic: [u8; 4],

    /// Format version
    pub version: u16,

    /// Length of the fixed row area
    pub fixed_size: u16,

    #[br(temp)]
    #[bw(calc = columns.len() as u16)]
    column_count: u16,

    #[br(temp)]
    #[bw(calc = pages.len() as u16)]
    page_count: u16,

    #[br(temp)]
    #[bw(calc = languages.len() as u16)]
    language_count: u16,

    /// Header fields this crate does not interpret
    pub reserved: [u8; 18],

    /// Column layout
    #[br(count = column_count)]
    pub columns: Vec<ColumnDefinition>,

    /// Row id ranges, one sheet entry each
    #[br(count = page_count)]
    pub pages: Vec<PageRange>,

    /// Language codes the sheet is localised in
    #[br(count = language_count)]
    pub languages: Vec<u16>,
}

impl SheetSchema {
    /// Create a schema with no pages or languages
    pub fn new(fixed_size: u16, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            magic: EXH_MAGIC,
            version: 3,
            fixed_size,
            reserved: [0; 18],
            columns,
            pages: Vec::new(),
            languages: Vec::new(),
        }
    }

    /// Parse a schema from its entry bytes
    pub fn parse(data: &[u8]) -> ExhResult<Self> {
        if data.len() >= 4 && data[..4] != EXH_MAGIC {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&data[..4]);
            return Err(ExhError::InvalidMagic(magic));
        }
        Ok(Self::read(&mut Cursor::new(data))?)
    }

    /// Encode the schema
    pub fn to_bytes(&self) -> ExhResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Column at a fixed-area byte offset
    pub fn column_at(&self, offset: u32) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| u32::from(c.offset) == offset)
    }

    /// Columns holding string pool offsets, in declaration order
    pub fn string_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns
            .iter()
            .filter(|c| c.kind() == Some(ColumnKind::String))
    }

    /// Candidate entry paths for every page of `sheet`
    ///
    /// Each page yields the language-suffixed path first, then the
    /// unsuffixed one used by sheets that are not localised.
    pub fn page_paths(&self, sheet: &str, language_suffix: &str) -> Vec<[String; 2]> {
        self.pages
            .iter()
            .map(|page| {
                [
                    format!("exd/{sheet}_{}_{language_suffix}.exd", page.start_id),
                    format!("exd/{sheet}_{}.exd", page.start_id),
                ]
            })
            .collect()
    }
}
