//! Four-row-header CSV patch tables
//!
//! Patch tables are exported sheets with this layout:
//!
//! ```text
//! key,0,1            <- ignored
//! #,Name,Description <- ignored
//! offset,0,4         <- column byte offsets inside the row
//! int32,str,str      <- column type names (key column first)
//! 5,10,"hi"          <- data rows: row key, then one value per column
//! ```
//!
//! Quoting follows RFC 4180: `"` delimits a field, `""` inside a quoted field
//! is a literal quote, and line breaks inside quotes belong to the field.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

/// Parsed patch table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    /// Byte offset of each data column inside the row (`-1` if unparsable)
    pub offsets: Vec<i32>,
    /// Type name of each data column, raw
    pub types: Vec<String>,
    /// Row key to raw column values; the last row with a given key wins
    pub rows: BTreeMap<u32, Vec<String>>,
}

/// One patched column of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnValue<'a> {
    /// Column byte offset inside the row
    pub offset: u32,
    /// Type name from the CSV type row, if present
    pub type_name: Option<&'a str>,
    /// Raw patch text
    pub value: &'a str,
}

impl CsvTable {
    /// Read a table from disk
    ///
    /// A missing file yields an empty table.
    pub fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Parse a table from text
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut chars = text.chars().peekable();
        let mut table = Self::default();

        // Two descriptive header rows carry nothing we need
        read_record(&mut chars);
        read_record(&mut chars);

        if let Some(offset_row) = read_record(&mut chars) {
            table.offsets = offset_row
                .iter()
                .skip(1)
                .map(|part| part.trim().parse::<i32>().unwrap_or(-1))
                .collect();
        }

        if let Some(type_row) = read_record(&mut chars) {
            // Exports carry a type for the key column too; short type rows
            // describe the data columns only.
            let skip = usize::from(type_row.len() > table.offsets.len());
            table.types = type_row.into_iter().skip(skip).collect();
        }

        while chars.peek().is_some() {
            let Some(record) = read_record(&mut chars) else {
                break;
            };
            if record.is_empty() {
                continue;
            }
            if let Ok(key) = record[0].trim().parse::<u32>() {
                table.rows.insert(key, record[1..].to_vec());
            }
        }

        table
    }

    /// Drop rows by key, returning how many were present
    pub fn remove_rows<'a>(&mut self, keys: impl IntoIterator<Item = &'a u32>) -> usize {
        keys.into_iter()
            .filter(|key| self.rows.remove(key).is_some())
            .count()
    }

    /// Patched columns of one row, paired with their offsets and type names
    ///
    /// Columns whose offset failed to parse are dropped.
    pub fn column_values(&self, key: u32) -> Vec<ColumnValue<'_>> {
        let Some(values) = self.rows.get(&key) else {
            return Vec::new();
        };
        values
            .iter()
            .zip(&self.offsets)
            .enumerate()
            .filter_map(|(i, (value, &offset))| {
                let offset = u32::try_from(offset).ok()?;
                Some(ColumnValue {
                    offset,
                    type_name: self.types.get(i).map(String::as_str),
                    value,
                })
            })
            .collect()
    }

    /// Check if the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read one record; `None` at end of input
fn read_record(chars: &mut Peekable<Chars<'_>>) -> Option<Vec<String>> {
    chars.peek()?;

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    while let Some(c) = chars.next() {
        if in_quote {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quote = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            '"' => in_quote = true,
            ',' => fields.push(std::mem::take(&mut current)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                break;
            }
            '\n' => break,
            _ => current.push(c),
        }
    }

    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
    }
    Some(fields)
}
