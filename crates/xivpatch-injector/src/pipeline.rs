//! Patch run orchestration.
//!
//! A run is linear:
//!
//! 1. Refuse to start if the resource directory is missing or the game runs
//! 2. Map every indexed address to its repository
//! 3. Turn each patch input into queued entries (sheet pages are merged with
//!    the shipped page, loose assets are taken as they are)
//! 4. Encode, append and index each queued entry
//! 5. Write every touched index file back
//!
//! Failures in steps 3 and 4 only cost the item at hand. Cancellation is
//! checked between items; a run that stops before step 5 leaves the index
//! files untouched.

use crate::config::PatchConfig;
use crate::error::{ItemError, PatchError};
use crate::exclusions::ExclusionRules;
use crate::inputs::{FONT_FOLDER, InputKind, PatchInput, discover};
use crate::process::{ProcProbe, ProcessProbe};
use crate::sink::{CancellationToken, PatchSink};
use serde::Serialize;
use std::fmt;
use tracing::debug;
use xivpatch_formats::EntryAddress;
use xivpatch_formats::container::{build_binary, build_texture};
use xivpatch_formats::csv::CsvTable;
use xivpatch_formats::exd::merge_sheet;
use xivpatch_formats::exh::SheetSchema;
use xivpatch_formats::fdt::{merge_bytes, needs_repair, repair};
use xivpatch_formats::hash::split_path;
use xivpatch_formats::index::IndexKind;
use xivpatch_storage::{
    DatWriter, EntrySource, GameInstall, IndexCache, RepositoryLocation, RepositoryMap,
    SqPackReader, StorageError,
};

/// Folder of the base game repositories
const BASE_FOLDER: &str = "ffxiv";

/// Domain holding sheets when discovery misses a page
const SHEET_DOMAIN: &str = "0a0000";

/// Domain holding `common/` assets when discovery misses one
const COMMON_DOMAIN: &str = "000000";

/// Outcome counters of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Entries queued for injection
    pub queued: usize,
    /// Inputs or sheet pages that produced no entry
    pub skipped: usize,
    /// Entries appended and indexed (in a dry run: encoded)
    pub injected: usize,
    /// Queued entries that could not be injected
    pub failed: usize,
    /// Index files written back
    pub indexes_written: usize,
    /// Whether the archives were left untouched
    pub dry_run: bool,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} queued, {} skipped, {} injected, {} failed",
            self.queued, self.skipped, self.injected, self.failed
        )?;
        if self.dry_run {
            write!(f, " (dry run)")?;
        }
        Ok(())
    }
}

/// One entry waiting to be written
#[derive(Debug)]
struct QueuedItem {
    path: String,
    data: Vec<u8>,
    texture: bool,
    address: EntryAddress,
    location: RepositoryLocation,
}

impl QueuedItem {
    fn encode(&self) -> Result<Vec<u8>, ItemError> {
        let entry = if self.texture {
            build_texture(&self.data)?
        } else {
            build_binary(&self.data)?
        };
        Ok(entry)
    }

    fn index_kinds(&self) -> &'static [IndexKind] {
        if self.texture {
            &[IndexKind::Primary, IndexKind::Secondary]
        } else {
            &[IndexKind::Primary]
        }
    }
}

/// A configured patch run
pub struct Pipeline<'a> {
    config: &'a PatchConfig,
    sink: &'a dyn PatchSink,
    probe: Box<dyn ProcessProbe + 'a>,
    cancel: CancellationToken,
}

impl fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<'a> Pipeline<'a> {
    /// Create a run reporting to `sink`
    pub fn new(config: &'a PatchConfig, sink: &'a dyn PatchSink) -> Self {
        Self {
            config,
            sink,
            probe: Box::new(ProcProbe::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `probe` to detect a running game
    #[must_use]
    pub fn with_probe(mut self, probe: impl ProcessProbe + 'a) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Stop between items once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run against the archives of the configured game directory
    pub fn run(&self) -> Result<RunReport, PatchError> {
        self.check_preconditions()?;
        let install = GameInstall::open(&self.config.game_root)?;
        let mut source = SqPackReader::new(&install);
        self.execute(&install, &mut source)
    }

    /// Run with original entries read from `source`
    pub fn run_with_source(&self, source: &mut dyn EntrySource) -> Result<RunReport, PatchError> {
        self.check_preconditions()?;
        let install = GameInstall::open(&self.config.game_root)?;
        self.execute(&install, source)
    }

    fn check_preconditions(&self) -> Result<(), PatchError> {
        if !self.config.resource_root.is_dir() {
            return Err(PatchError::ResourcePathMissing(
                self.config.resource_root.clone(),
            ));
        }
        if let Some(process) = self.probe.running_game() {
            return Err(PatchError::GameRunning(process));
        }
        self.checkpoint()
    }

    fn checkpoint(&self) -> Result<(), PatchError> {
        if self.cancel.is_cancelled() {
            return Err(PatchError::Cancelled);
        }
        Ok(())
    }

    fn log(&self, message: &str) {
        self.sink.on_log(message);
    }

    fn execute(
        &self,
        install: &GameInstall,
        source: &mut dyn EntrySource,
    ) -> Result<RunReport, PatchError> {
        let filter = self.config.filter_set();
        let inputs = discover(&self.config.resource_root, filter.as_ref())?;
        self.log(&format!(
            "Found {} patch files in {}",
            inputs.len(),
            self.config.resource_root.display()
        ));

        let rules = self.load_rules();
        let map = RepositoryMap::scan(install)?;

        let mut report = RunReport {
            dry_run: self.config.dry_run,
            ..RunReport::default()
        };
        let mut queue = Vec::new();
        for input in &inputs {
            self.checkpoint()?;
            if rules.excludes_file(&input.internal) {
                self.log(&format!("Skipping excluded file {}", input.relative));
                report.skipped += 1;
                continue;
            }

            let outcome = match input.kind {
                InputKind::Sheet => self.queue_sheet(input, &rules, &map, source, &mut queue),
                InputKind::Page | InputKind::Font | InputKind::Texture => self
                    .queue_asset(input, &map, source)
                    .map(|item| {
                        queue.push(item);
                        0
                    }),
            };
            match outcome {
                Ok(missing_pages) => report.skipped += missing_pages,
                Err(e) => {
                    self.log(&format!("Skipping {}: {}", input.relative, e));
                    report.skipped += 1;
                }
            }
        }
        report.queued = queue.len();
        self.log(&format!(
            "Prepared {} entries, {} skipped",
            report.queued, report.skipped
        ));

        if self.config.dry_run {
            self.encode_only(&queue, &mut report)?;
        } else {
            self.inject_all(install, &queue, &mut report)?;
        }

        self.log(&format!("Patch run finished: {report}"));
        Ok(report)
    }

    fn load_rules(&self) -> ExclusionRules {
        let Some(path) = &self.config.exclusion_rules else {
            return ExclusionRules::default();
        };
        match ExclusionRules::load(path) {
            Ok(rules) => {
                self.log(&format!("Loaded exclusion rules for {} paths", rules.len()));
                rules
            }
            Err(e) => {
                self.log(&format!("Ignoring exclusion rules: {e}"));
                ExclusionRules::default()
            }
        }
    }

    /// Merge a patch table into every page of its sheet
    ///
    /// Returns the number of pages that were not found.
    fn queue_sheet(
        &self,
        input: &PatchInput,
        rules: &ExclusionRules,
        map: &RepositoryMap,
        source: &mut dyn EntrySource,
        queue: &mut Vec<QueuedItem>,
    ) -> Result<usize, ItemError> {
        let sheet = input.sheet_name().unwrap_or(input.internal.as_str());
        let mut table = CsvTable::read(&input.source).map_err(|e| ItemError::Read {
            path: input.source.clone(),
            source: e,
        })?;
        if let Some(keys) = rules.excluded_keys(&input.internal) {
            let removed = table.remove_rows(keys);
            if removed > 0 {
                self.log(&format!(
                    "Removed {} excluded rows from {}",
                    removed, input.relative
                ));
            }
        }

        let schema_path = format!("exd/{sheet}.exh");
        let schema_address = EntryAddress::from_path(&schema_path);
        let schema_bytes = source
            .read_entry(&sheet_location(map, schema_address), schema_address)?
            .ok_or_else(|| ItemError::MissingSchema(sheet.to_string()))?;
        let schema = SheetSchema::parse(&schema_bytes)?;
        let excluded_offsets = rules.excluded_offsets(&input.internal);

        let mut missing = 0;
        for candidates in schema.page_paths(sheet, self.config.language.suffix()) {
            let mut found = false;
            for path in &candidates {
                let address = EntryAddress::from_path(path);
                let location = sheet_location(map, address);
                let Some(original) = source.read_entry(&location, address)? else {
                    continue;
                };
                let data = merge_sheet(&original, &table, &schema, excluded_offsets)?;
                debug!("Merged {} ({} bytes) for {}", path, data.len(), location);
                queue.push(QueuedItem {
                    path: path.clone(),
                    data,
                    texture: false,
                    address,
                    location,
                });
                found = true;
                break;
            }
            if !found {
                self.log(&format!("No page found for {}", candidates[0]));
                missing += 1;
            }
        }
        Ok(missing)
    }

    /// Take a loose asset as the replacement of its archive entry
    fn queue_asset(
        &self,
        input: &PatchInput,
        map: &RepositoryMap,
        source: &mut dyn EntrySource,
    ) -> Result<QueuedItem, ItemError> {
        let path = input.asset_path();
        let address = EntryAddress::from_path(&path);
        let location = match map.locate(address) {
            Some(location) => location.clone(),
            None if split_path(&path).0 == FONT_FOLDER => {
                RepositoryLocation::new(BASE_FOLDER, COMMON_DOMAIN)
            }
            None => return Err(ItemError::NotIndexed(path)),
        };

        let mut data = std::fs::read(&input.source).map_err(|e| ItemError::Read {
            path: input.source.clone(),
            source: e,
        })?;
        if input.kind == InputKind::Font {
            data = self.prepare_font(&path, &location, address, data, source)?;
        }

        Ok(QueuedItem {
            path,
            data,
            texture: input.kind == InputKind::Texture,
            address,
            location,
        })
    }

    fn prepare_font(
        &self,
        path: &str,
        location: &RepositoryLocation,
        address: EntryAddress,
        mut data: Vec<u8>,
        source: &mut dyn EntrySource,
    ) -> Result<Vec<u8>, ItemError> {
        if let Some(options) = self.config.font_merge_options() {
            match source.read_entry(location, address)? {
                Some(base) => {
                    data = merge_bytes(&base, &data, &options)?;
                    self.log(&format!("Merged font table {path}"));
                }
                None => self.log(&format!(
                    "No shipped font table for {path}, using the patch file as-is"
                )),
            }
        }

        if !needs_repair(&data) {
            return Ok(data);
        }
        match repair(&data) {
            Ok(repaired) => {
                self.log(&format!("Repaired kerning block of {path}"));
                Ok(repaired)
            }
            Err(e) => {
                self.log(&format!("Failed to repair {path}: {e}"));
                Ok(data)
            }
        }
    }

    fn encode_only(&self, queue: &[QueuedItem], report: &mut RunReport) -> Result<(), PatchError> {
        for (done, item) in queue.iter().enumerate() {
            self.checkpoint()?;
            match item.encode() {
                Ok(entry) => {
                    debug!("Encoded {} ({} bytes)", item.path, entry.len());
                    report.injected += 1;
                }
                Err(e) => {
                    self.log(&format!("Failed to encode {}: {}", item.path, e));
                    report.failed += 1;
                }
            }
            self.report_progress(done + 1, queue.len());
        }
        Ok(())
    }

    fn inject_all(
        &self,
        install: &GameInstall,
        queue: &[QueuedItem],
        report: &mut RunReport,
    ) -> Result<(), PatchError> {
        let mut writer = DatWriter::new(install);
        let mut indexes = IndexCache::new(install);

        for (done, item) in queue.iter().enumerate() {
            self.checkpoint()?;
            match inject(item, &mut writer, &mut indexes) {
                Ok(()) => {
                    self.log(&format!("{} -> {}", item.path, item.location));
                    report.injected += 1;
                }
                Err(ItemError::Storage(StorageError::Io(e))) => {
                    return Err(StorageError::Io(e).into());
                }
                Err(e) => {
                    self.log(&format!("Failed to inject {}: {}", item.path, e));
                    report.failed += 1;
                }
            }
            self.report_progress(done + 1, queue.len());
        }

        writer.close()?;
        report.indexes_written = indexes.write_back()?;
        Ok(())
    }

    fn report_progress(&self, done: usize, total: usize) {
        if total > 0 {
            self.sink.on_progress(done as f64 / total as f64);
        }
    }
}

fn sheet_location(map: &RepositoryMap, address: EntryAddress) -> RepositoryLocation {
    map.locate(address)
        .cloned()
        .unwrap_or_else(|| RepositoryLocation::new(BASE_FOLDER, SHEET_DOMAIN))
}

/// Append `item` and record it in its indexes
///
/// The primary index must exist before anything is appended. A missing
/// `.index2` is tolerated: the entry is still reachable through the primary
/// index, so the item counts as injected.
fn inject(
    item: &QueuedItem,
    writer: &mut DatWriter,
    indexes: &mut IndexCache,
) -> Result<(), ItemError> {
    if indexes
        .get_mut(&item.location, IndexKind::Primary)?
        .is_none()
    {
        return Err(ItemError::MissingIndex(format!(
            "{} ({})",
            item.location,
            IndexKind::Primary.extension()
        )));
    }

    let entry = item.encode()?;
    let locator = writer.append_entry(&item.location, 0, &entry)?;
    for &kind in item.index_kinds() {
        if indexes
            .upsert(&item.location, kind, item.address, locator)?
            .is_none()
        {
            debug!("{} not recorded in {} index", item.path, kind.extension());
        }
    }
    Ok(())
}
