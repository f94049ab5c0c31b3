//! In-place index mutation

use super::layout::{
    self, FOLDER_RECORD_SIZE, FOLDER_SEGMENT, SEGMENT_COUNT, read_u32, write_u32,
};
use super::{IndexBuffer, IndexKind, IndexResult, Locator, adler32};
use crate::hash::EntryAddress;
use tracing::{debug, warn};

/// Outcome of [`IndexBuffer::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// An existing record had its locator replaced
    Updated {
        /// Record position in segment 0
        position: usize,
    },
    /// A new record was spliced in
    Inserted {
        /// Record position in segment 0
        position: usize,
    },
}

impl IndexBuffer {
    /// Point `address` at `locator`, inserting a record when absent
    ///
    /// Inserting grows the file by one record. Every segment that started at or
    /// after the old end of segment 0 is moved down, and for primary indexes the
    /// folder runs in segment 3 are kept in step. Checksums of every segment
    /// touched are recomputed.
    pub fn upsert(&mut self, address: EntryAddress, locator: Locator) -> IndexResult<Upsert> {
        let key = self.kind.key_of(address);
        match self.search(key) {
            Ok(position) => {
                self.update_at(position, locator)?;
                Ok(Upsert::Updated { position })
            }
            Err(position) => {
                self.insert_at(position, address, locator)?;
                Ok(Upsert::Inserted { position })
            }
        }
    }

    fn update_at(&mut self, position: usize, locator: Locator) -> IndexResult<()> {
        let descriptor = self.primary_descriptor()?;
        let record_size = self.kind.record_size();
        let locator_field = match self.kind {
            IndexKind::Primary => 8,
            IndexKind::Secondary => 4,
        };
        let pos = descriptor.offset as usize + position * record_size + locator_field;
        write_u32(&mut self.data, pos, locator.raw());
        self.refresh_checksum(0);
        Ok(())
    }

    fn insert_at(
        &mut self,
        position: usize,
        address: EntryAddress,
        locator: Locator,
    ) -> IndexResult<()> {
        let descriptor = self.primary_descriptor()?;
        let record_size = self.kind.record_size();
        let old_end = descriptor.end();
        let target = descriptor.offset as usize + position * record_size;

        let mut record = Vec::with_capacity(record_size);
        match self.kind {
            IndexKind::Primary => {
                record.extend_from_slice(&address.to_u64().to_le_bytes());
                record.extend_from_slice(&locator.raw().to_le_bytes());
                record.extend_from_slice(&0u32.to_le_bytes());
            }
            IndexKind::Secondary => {
                record.extend_from_slice(&address.file_hash.to_le_bytes());
                record.extend_from_slice(&locator.raw().to_le_bytes());
            }
        }
        self.data.splice(target..target, record);

        let grown = descriptor.size + record_size as u32;
        write_u32(&mut self.data, layout::size_field(0), grown);
        self.refresh_checksum(0);

        for segment in 1..SEGMENT_COUNT {
            let field = layout::descriptor_offset(segment);
            if field + 4 > self.data.len() {
                break;
            }
            let Some(offset) = read_u32(&self.data, field) else {
                break;
            };
            if offset as usize >= old_end {
                write_u32(&mut self.data, field, offset + record_size as u32);
            }
        }

        if self.kind == IndexKind::Primary {
            self.adjust_folders(address.path_hash, target);
        }

        debug!(
            "Inserted {} at record {} ({} index)",
            address,
            position,
            self.kind.extension()
        );
        Ok(())
    }

    /// Grow the run of `parent` by one record and move every run behind `target`
    fn adjust_folders(&mut self, parent: u32, target: usize) {
        let Some(folders) = self.segment(FOLDER_SEGMENT) else {
            return;
        };
        if folders.size == 0 || folders.end() > self.data.len() {
            return;
        }

        let step = FOLDER_RECORD_SIZE as u32;
        let mut found = false;
        for pos in folders.range().step_by(FOLDER_RECORD_SIZE) {
            if pos + FOLDER_RECORD_SIZE > folders.end() {
                break;
            }
            let (Some(hash), Some(run_offset), Some(run_size)) = (
                read_u32(&self.data, pos),
                read_u32(&self.data, pos + 4),
                read_u32(&self.data, pos + 8),
            ) else {
                break;
            };
            if hash == parent {
                write_u32(&mut self.data, pos + 8, run_size + step);
                found = true;
            } else if run_offset as usize >= target {
                write_u32(&mut self.data, pos + 4, run_offset + step);
            }
        }

        if !found {
            warn!("Folder {:08X} has no run in the folder segment", parent);
        }
        self.refresh_checksum(FOLDER_SEGMENT);
    }

    fn refresh_checksum(&mut self, segment: usize) {
        let Some(descriptor) = self.segment(segment) else {
            return;
        };
        if let Some(bytes) = self.data.get(descriptor.range()) {
            let sum = adler32(bytes);
            write_u32(&mut self.data, layout::checksum_field(segment), sum);
        }
    }
}
