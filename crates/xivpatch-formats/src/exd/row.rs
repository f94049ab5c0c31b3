//! Per-row patch application
//!
//! A row is `[data size u32][subrow count u16][fixed area][string pool][padding]`.
//! Patching rewrites numeric fields in place and rebuilds the string pool from
//! scratch, so a longer or shorter string moves every string behind it.

use std::collections::{HashMap, HashSet};

use super::value::{encode_game_string, write_numeric};
use crate::csv::CsvTable;
use crate::exh::{ColumnKind, SheetSchema};

/// Size of the header in front of every row
pub const ROW_HEADER_SIZE: usize = 6;

/// String offset value marking an absent string
const NO_STRING: u32 = 0xFFFF_FFFF;

/// Applies patch table values to rows of one sheet
#[derive(Debug, Clone, Copy)]
pub struct RowPatcher<'a> {
    schema: &'a SheetSchema,
    patch: &'a CsvTable,
    excluded: Option<&'a HashSet<u32>>,
}

impl<'a> RowPatcher<'a> {
    /// Create a patcher for rows described by `schema`
    pub fn new(schema: &'a SheetSchema, patch: &'a CsvTable) -> Self {
        Self {
            schema,
            patch,
            excluded: None,
        }
    }

    /// Leave the columns at these fixed-area offsets untouched
    #[must_use]
    pub fn with_excluded_offsets(mut self, excluded: &'a HashSet<u32>) -> Self {
        self.excluded = Some(excluded);
        self
    }

    /// Check if the patch table has values for `row_id`
    pub fn has_patch(&self, row_id: u32) -> bool {
        self.patch.rows.contains_key(&row_id)
    }

    fn is_excluded(&self, offset: u32) -> bool {
        self.excluded.is_some_and(|set| set.contains(&offset))
    }

    /// Patch one row, returning the rebuilt row bytes
    ///
    /// `row` holds the original row including its header. Rows without patch
    /// values are returned unchanged.
    pub fn patch_row(&self, row_id: u32, row: &[u8]) -> Vec<u8> {
        if !self.has_patch(row_id) {
            return row.to_vec();
        }

        let fixed_len = ROW_HEADER_SIZE + usize::from(self.schema.fixed_size);
        let mut out = vec![0u8; fixed_len];
        let copied = row.len().min(fixed_len);
        out[..copied].copy_from_slice(&row[..copied]);

        // Later columns with the same offset win
        let mut patched: HashMap<u32, &str> = HashMap::new();
        for column in self.patch.column_values(row_id) {
            patched.insert(column.offset, column.value);

            let kind = match self.schema.column_at(column.offset) {
                Some(definition) => definition.kind(),
                None => column.type_name.and_then(ColumnKind::from_type_name),
            };
            let Some(kind) = kind else { continue };
            if kind == ColumnKind::String || self.is_excluded(column.offset) {
                continue;
            }
            let field = ROW_HEADER_SIZE + column.offset as usize;
            if field + kind.width() <= fixed_len {
                // Unparsable values keep the original bytes
                write_numeric(kind, column.value, &mut out[field..]);
            }
        }

        let pool_start = out.len();
        for column in self.schema.string_columns() {
            let offset = u32::from(column.offset);
            let field = ROW_HEADER_SIZE + usize::from(column.offset);
            if field + 4 > fixed_len {
                continue;
            }

            let text = match patched.get(&offset) {
                Some(value) if !self.is_excluded(offset) => encode_game_string(value),
                _ => original_string(row, field, fixed_len).to_vec(),
            };

            let relative = (out.len() - pool_start) as u32;
            out[field..field + 4].copy_from_slice(&relative.to_be_bytes());
            out.extend_from_slice(&text);
            out.push(0);
        }

        let body = out.len() - ROW_HEADER_SIZE;
        let padding = 4 - body % 4;
        out[..4].copy_from_slice(&((body + padding) as u32).to_be_bytes());
        out.resize(out.len() + padding, 0);
        out
    }
}

/// Zero-terminated string referenced by the field at `field` of `row`
fn original_string(row: &[u8], field: usize, pool_start: usize) -> &[u8] {
    let Some(relative) = row
        .get(field..field + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
    else {
        return &[];
    };
    if relative == NO_STRING {
        return &[];
    }
    let start = pool_start + relative as usize;
    let Some(tail) = row.get(start..) else {
        return &[];
    };
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    &tail[..end]
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exh::ColumnDefinition;
    use pretty_assertions::assert_eq;

    /// Fixed area: name (str) @0, price (u32) @4, flag bits @8, desc (str) @12
    fn schema() -> SheetSchema {
        SheetSchema::new(
            16,
            vec![
                ColumnDefinition { type_code: 0, offset: 0 },
                ColumnDefinition { type_code: 7, offset: 4 },
                ColumnDefinition { type_code: 0x19, offset: 8 },
                ColumnDefinition { type_code: 0, offset: 12 },
            ],
        )
    }

    fn build_row(name: &[u8], price: u32, desc: &[u8]) -> Vec<u8> {
        let mut row = vec![0u8; ROW_HEADER_SIZE + 16];
        row[4..6].copy_from_slice(&1u16.to_be_bytes());
        row[6..10].copy_from_slice(&0u32.to_be_bytes());
        row[10..14].copy_from_slice(&price.to_be_bytes());
        row[18..22].copy_from_slice(&(name.len() as u32 + 1).to_be_bytes());
        row.extend_from_slice(name);
        row.push(0);
        row.extend_from_slice(desc);
        row.push(0);
        let body = row.len() - ROW_HEADER_SIZE;
        let padding = 4 - body % 4;
        row[..4].copy_from_slice(&((body + padding) as u32).to_be_bytes());
        row.resize(row.len() + padding, 0);
        row
    }

    fn table(row: &str) -> CsvTable {
        CsvTable::parse(&format!(
            "key,0,1,2,3\n#,Name,Price,Flag,Desc\noffset,0,4,8,12\nint32,str,uint32,bool,str\n{row}\n"
        ))
    }

    fn declared_len(row: &[u8]) -> usize {
        u32::from_be_bytes(row[..4].try_into().expect("header")) as usize
    }

    #[test]
    fn test_identity_patch_is_byte_identical() {
        let schema = schema();
        let original = build_row(b"Potion", 40, b"Restores HP.");
        let patch = table("7,Potion,40,0,Restores HP.");

        let patched = RowPatcher::new(&schema, &patch).patch_row(7, &original);
        assert_eq!(patched, original);
    }

    #[test]
    fn test_longer_string_moves_pool() {
        let schema = schema();
        let original = build_row(b"Potion", 40, b"Restores HP.");
        let patch = table("7,Hi-Potion,75,1,Restores HP.");

        let patched = RowPatcher::new(&schema, &patch).patch_row(7, &original);
        assert_eq!(&patched[10..14], &75u32.to_be_bytes());
        assert_eq!(patched[14], 1);
        assert_eq!(&patched[6..10], &0u32.to_be_bytes());
        assert_eq!(&patched[18..22], &10u32.to_be_bytes());
        assert_eq!(&patched[22..32], b"Hi-Potion\0");
        assert_eq!(&patched[32..45], b"Restores HP.\0");
        assert_eq!(declared_len(&patched) % 4, 0);
        assert_eq!(declared_len(&patched) + ROW_HEADER_SIZE, patched.len());
    }

    #[test]
    fn test_unpatched_strings_are_carried_over() {
        let schema = schema();
        let original = build_row(b"Ether", 100, b"Restores MP.");
        // Only the name column is present in this table
        let patch = CsvTable::parse("key,0\n#,Name\noffset,0\nint32,str\n3,<hex:0203>Ether\n");

        let patched = RowPatcher::new(&schema, &patch).patch_row(3, &original);
        assert_eq!(&patched[22..30], b"\x02\x03Ether\0");
        assert_eq!(&patched[18..22], &8u32.to_be_bytes());
        assert_eq!(&patched[30..43], b"Restores MP.\0");
        assert_eq!(&patched[10..14], &100u32.to_be_bytes());
    }

    #[test]
    fn test_excluded_offsets_keep_original() {
        let schema = schema();
        let original = build_row(b"Potion", 40, b"Restores HP.");
        let patch = table("7,Elixir,999,1,Cures all.");
        let excluded: HashSet<u32> = [0, 4].into_iter().collect();

        let patched = RowPatcher::new(&schema, &patch)
            .with_excluded_offsets(&excluded)
            .patch_row(7, &original);
        assert_eq!(&patched[10..14], &40u32.to_be_bytes());
        assert_eq!(&patched[22..29], b"Potion\0");
        assert_eq!(&patched[29..40], b"Cures all.\0");
        assert_eq!(patched[14], 1);
    }

    #[test]
    fn test_bad_numeric_and_unknown_row() {
        let schema = schema();
        let original = build_row(b"Potion", 40, b"x");
        let patch = table("7,Potion,lots,0,x");

        let patcher = RowPatcher::new(&schema, &patch);
        assert_eq!(&patcher.patch_row(7, &original)[10..14], &40u32.to_be_bytes());
        assert_eq!(patcher.patch_row(8, &original), original);
    }

    #[test]
    fn test_absent_string_marker() {
        let schema = schema();
        let mut original = build_row(b"", 1, b"");
        original[18..22].copy_from_slice(&NO_STRING.to_be_bytes());
        let patch = CsvTable::parse("k,0\n#,P\noffset,4\nint32,uint32\n1,2\n");

        let patched = RowPatcher::new(&schema, &patch).patch_row(1, &original);
        assert_eq!(&patched[18..22], &1u32.to_be_bytes());
        assert_eq!(&patched[22..24], &[0, 0]);
        assert_eq!(declared_len(&patched) % 4, 0);
    }
}
