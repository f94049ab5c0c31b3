//! Sheet pages (`.exd`)
//!
//! ```text
//! [0x00] "EXDF" 00 02 00 00
//! [0x08] index table length   [0x0C] data area length
//! [0x20] index table: (row id u32, absolute row offset u32) each
//!        rows: [data size u32][subrow count u16][data...]
//! ```
//!
//! All fields are big-endian. [`merge_sheet`] is the entry point used by the
//! patch pipeline: it decodes a page, patches the rows named by a patch
//! table and rebuilds the page with rows in ascending id order.

mod error;
mod row;
mod value;

pub use error::{ExdError, ExdResult};
pub use row::{ROW_HEADER_SIZE, RowPatcher};
pub use value::{encode_game_string, write_numeric};

use std::collections::{BTreeMap, HashSet};

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use tracing::{debug, warn};

use crate::csv::CsvTable;
use crate::exh::SheetSchema;

/// Sheet page magic
pub const EXD_MAGIC: [u8; 4] = *b"EXDF";

/// Size of the page header
pub const SHEET_HEADER_SIZE: usize = 32;

/// Size of one index table record
const INDEX_ENTRY_SIZE: usize = 8;

/// Sheet page header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(big)]
#[bw(big)]
pub struct SheetHeader {
    /// Magic signature, always "EXDF"
    #[br(assert(magic == EXD_MAGIC, "invalid sheet magic: {:?}", magic))]
    pub magic: [u8; 4],
    /// Format version, always 2
    pub version: u16,
    /// Unused
    pub reserved: u16,
    /// Length of the row index table
    pub index_size: u32,
    /// Length of the row data area
    pub data_size: u32,
    /// Unused header tail
    pub padding: [u8; 16],
}

impl SheetHeader {
    /// Header declaring the given table and data lengths
    pub fn new(index_size: u32, data_size: u32) -> Self {
        Self {
            magic: EXD_MAGIC,
            version: 2,
            reserved: 0,
            index_size,
            data_size,
            padding: [0; 16],
        }
    }
}

/// Decoded sheet page: whole rows (header included) by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExdSheet {
    /// Row bytes by row id
    pub rows: BTreeMap<u32, Vec<u8>>,
}

impl ExdSheet {
    /// Decode a page
    ///
    /// Index records pointing into the header or past the end are skipped; a
    /// row whose declared size overruns the data is cut at the end of input.
    pub fn parse(data: &[u8]) -> ExdResult<Self> {
        if data.len() < SHEET_HEADER_SIZE || data[..4] != EXD_MAGIC {
            return Err(ExdError::NotASheet);
        }
        let header = SheetHeader::read(&mut Cursor::new(data))?;
        let data_start = SHEET_HEADER_SIZE + header.index_size as usize;

        let mut rows = BTreeMap::new();
        let table_end = data_start.min(data.len());
        for record in data[SHEET_HEADER_SIZE..table_end].chunks_exact(INDEX_ENTRY_SIZE) {
            let id = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
            let offset = u32::from_be_bytes([record[4], record[5], record[6], record[7]]) as usize;
            if offset < data_start || offset + ROW_HEADER_SIZE > data.len() {
                debug!("Row {} points outside the page (0x{:X})", id, offset);
                continue;
            }
            let size = u32::from_be_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]) as usize;
            let end = (offset + ROW_HEADER_SIZE + size).min(data.len());
            rows.insert(id, data[offset..end].to_vec());
        }

        Ok(Self { rows })
    }

    /// Encode the page with rows in ascending id order
    pub fn to_bytes(&self) -> ExdResult<Vec<u8>> {
        let index_size = self.rows.len() * INDEX_ENTRY_SIZE;
        let data_size: usize = self.rows.values().map(Vec::len).sum();
        let total = SHEET_HEADER_SIZE + index_size + data_size;
        if u32::try_from(total).is_err() {
            return Err(ExdError::TooLarge(total));
        }

        let mut out = Cursor::new(Vec::with_capacity(total));
        SheetHeader::new(index_size as u32, data_size as u32).write(&mut out)?;

        let mut offset = (SHEET_HEADER_SIZE + index_size) as u32;
        for (&id, row) in &self.rows {
            id.write_be(&mut out)?;
            offset.write_be(&mut out)?;
            offset += row.len() as u32;
        }

        let mut out = out.into_inner();
        for row in self.rows.values() {
            out.extend_from_slice(row);
        }
        Ok(out)
    }

    /// Patch every row that has values in `patcher`'s table
    ///
    /// Returns how many rows were rewritten.
    pub fn apply(&mut self, patcher: &RowPatcher<'_>) -> usize {
        let mut patched = 0;
        for (&id, row) in &mut self.rows {
            if patcher.has_patch(id) {
                *row = patcher.patch_row(id, row);
                patched += 1;
            }
        }
        patched
    }
}

/// Patch one sheet page with a patch table
///
/// Data that is not a sheet page is returned unchanged.
pub fn merge_sheet(
    original: &[u8],
    patch: &CsvTable,
    schema: &SheetSchema,
    excluded_offsets: Option<&HashSet<u32>>,
) -> ExdResult<Vec<u8>> {
    let mut sheet = match ExdSheet::parse(original) {
        Ok(sheet) => sheet,
        Err(ExdError::NotASheet) => {
            warn!("Entry is not a sheet page, leaving it unchanged");
            return Ok(original.to_vec());
        }
        Err(e) => return Err(e),
    };

    let mut patcher = RowPatcher::new(schema, patch);
    if let Some(excluded) = excluded_offsets {
        patcher = patcher.with_excluded_offsets(excluded);
    }
    let patched = sheet.apply(&patcher);
    debug!("Patched {} of {} rows", patched, sheet.rows.len());

    sheet.to_bytes()
}
