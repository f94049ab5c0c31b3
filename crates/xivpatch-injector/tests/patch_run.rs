//! Full patch runs against a temporary game install

#![allow(clippy::expect_used, clippy::unwrap_used)]

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::path::Path;
use tempfile::{TempDir, tempdir};
use xivpatch_formats::EntryAddress;
use xivpatch_formats::container::build_binary;
use xivpatch_formats::exd::ExdSheet;
use xivpatch_formats::exh::{ColumnDefinition, PageRange, SheetSchema};
use xivpatch_formats::fdt::{
    EMPTY_KERNING_BLOCK, FontTable, GlyphEntry, HEADER_SIZE, MergeOptions, MergeStrategy,
    SCALE_1K, SCALE_FIELD, TEXTURE_COUNT_FIELD,
};
use xivpatch_formats::index::{IndexBuffer, IndexKind, Locator, adler32};
use xivpatch_injector::{
    CancellationToken, NoProcessProbe, PatchConfig, PatchError, PatchSink, Pipeline, RunReport,
};
use xivpatch_storage::{EntrySource, GameInstall, RepositoryLocation, SqPackReader};

#[derive(Default)]
struct RecordingSink {
    lines: RefCell<Vec<String>>,
}

impl PatchSink for RecordingSink {
    fn on_log(&self, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }

    fn on_progress(&self, _fraction: f64) {}
}

/// Sink that cancels the run as soon as injection starts
struct CancelOnProgress(CancellationToken);

impl PatchSink for CancelOnProgress {
    fn on_log(&self, _message: &str) {}

    fn on_progress(&self, _fraction: f64) {
        self.0.cancel();
    }
}

fn index_bytes(kind: IndexKind, mut records: Vec<(EntryAddress, Locator)>) -> Vec<u8> {
    records.sort_by_key(|(address, _)| kind.key_of(*address));
    let mut data = vec![0u8; 0x800];
    for (address, locator) in records {
        match kind {
            IndexKind::Primary => {
                data.extend_from_slice(&address.to_u64().to_le_bytes());
                data.extend_from_slice(&locator.raw().to_le_bytes());
                data.extend_from_slice(&[0u8; 4]);
            }
            IndexKind::Secondary => {
                data.extend_from_slice(&(kind.key_of(address) as u32).to_le_bytes());
                data.extend_from_slice(&locator.raw().to_le_bytes());
            }
        }
    }
    let size = (data.len() - 0x800) as u32;
    let checksum = adler32(&data[0x800..]);
    data[0x400..0x404].copy_from_slice(&0x400u32.to_le_bytes());
    data[0x408..0x40C].copy_from_slice(&0x800u32.to_le_bytes());
    data[0x40C..0x410].copy_from_slice(&size.to_le_bytes());
    data[0x410..0x414].copy_from_slice(&checksum.to_le_bytes());
    data
}

/// Write a repository whose dat0 holds `entries` behind a 0x800-byte header
fn write_repository(install: &GameInstall, location: &RepositoryLocation, entries: &[(&str, Vec<u8>)]) {
    std::fs::create_dir_all(install.folder_dir(&location.folder)).expect("mkdir");
    let mut body = vec![0u8; 0x800];
    let mut records = Vec::new();
    for (path, data) in entries {
        let locator = Locator::new(0, body.len() as u64).expect("locator");
        body.extend_from_slice(&build_binary(data).expect("build"));
        records.push((EntryAddress::from_path(path), locator));
    }
    std::fs::write(install.body_path(location, 0), body).expect("dat0");
    std::fs::write(
        install.index_path(location, IndexKind::Primary),
        index_bytes(IndexKind::Primary, records),
    )
    .expect("index");
    std::fs::write(
        install.index_path(location, IndexKind::Secondary),
        index_bytes(IndexKind::Secondary, Vec::new()),
    )
    .expect("index2");
}

fn write(root: &Path, relative: &str, data: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, data).expect("write");
}

fn glyph(code_point: u32, advance: u16) -> GlyphEntry {
    GlyphEntry {
        code_point,
        advance,
        texture_slot: 0,
        u: 0,
        v: 0,
        width: 10,
        height: 12,
        offset_x: 0,
        offset_y: 0,
    }
}

fn font_table(glyphs: Vec<GlyphEntry>) -> Vec<u8> {
    let mut header = [0u8; HEADER_SIZE];
    header[..8].copy_from_slice(b"fcsv0100");
    header[0x20..0x24].copy_from_slice(b"fthd");
    header[SCALE_FIELD..SCALE_FIELD + 4].copy_from_slice(&SCALE_1K.to_le_bytes());
    header[TEXTURE_COUNT_FIELD..TEXTURE_COUNT_FIELD + 4].copy_from_slice(&1u32.to_le_bytes());
    FontTable {
        header,
        glyphs,
        kerning: EMPTY_KERNING_BLOCK.to_vec(),
    }
    .to_bytes()
    .expect("font")
}

/// Item sheet: int32 at 0, string at 4, a single page of row 3 = (5, "a")
fn item_sheet() -> (Vec<u8>, Vec<u8>) {
    let mut schema = SheetSchema::new(
        8,
        vec![
            ColumnDefinition {
                type_code: 6,
                offset: 0,
            },
            ColumnDefinition {
                type_code: 0,
                offset: 4,
            },
        ],
    );
    schema.pages.push(PageRange {
        start_id: 0,
        row_count: 1,
    });

    let mut row = vec![0, 0, 0, 12, 0, 1];
    row.extend_from_slice(&5u32.to_be_bytes());
    row.extend_from_slice(&0u32.to_be_bytes());
    row.extend_from_slice(b"a\0\0\0");
    let mut page = ExdSheet::default();
    page.rows.insert(3, row);

    (
        schema.to_bytes().expect("schema"),
        page.to_bytes().expect("page"),
    )
}

struct Fixture {
    game: TempDir,
    resources: TempDir,
    install: GameInstall,
    sheets: RepositoryLocation,
    common: RepositoryLocation,
}

fn fixture() -> Fixture {
    let game = tempdir().expect("tempdir");
    let resources = tempdir().expect("tempdir");
    let install = GameInstall::new(game.path());
    let sheets = RepositoryLocation::new("ffxiv", "0a0000");
    let common = RepositoryLocation::new("ffxiv", "000000");

    let (schema, page) = item_sheet();
    write_repository(
        &install,
        &sheets,
        &[("exd/item.exh", schema), ("exd/item_0_en.exd", page)],
    );
    write_repository(
        &install,
        &common,
        &[(
            "common/font/axis_12.fdt",
            font_table(vec![glyph(65, 7), glyph(66, 8)]),
        )],
    );

    write(
        resources.path(),
        "rawexd/exd/Item.csv",
        b"key,0,1\r\n#,A,B\r\noffset,0,4\r\nint32,str\r\n3,42,\"hello\"\r\n",
    );
    write(resources.path(), "rawexd/exd/Skipped.csv", b"key\n#\noffset\nint32\n");
    write(
        resources.path(),
        "font/axis_12.fdt",
        &font_table(vec![glyph(66, 20), glyph(67, 21)]),
    );
    write(resources.path(), "common/graphics/dummy.tex", &[0u8; 0x60]);
    write(
        resources.path(),
        "compat.json",
        br#"{ "third-party": [ { "path": "rawexd/exd/Skipped.csv", "type": "File" } ] }"#,
    );

    let mut texture = vec![0u8; 0x50];
    texture[0x12] = 1;
    texture[0x1C..0x20].copy_from_slice(&0x50u32.to_le_bytes());
    texture.extend(0..64u8);
    write(resources.path(), "font1.tex", &texture);

    Fixture {
        game,
        resources,
        install,
        sheets,
        common,
    }
}

fn config(fixture: &Fixture) -> PatchConfig {
    PatchConfig::new(fixture.game.path(), fixture.resources.path())
        .with_exclusion_rules(fixture.resources.path().join("compat.json"))
        .with_font_merge(MergeOptions {
            strategy: MergeStrategy::PreferBase,
            target_slot: None,
            promote_low_resolution_base: false,
        })
}

#[test]
fn patch_run_injects_sheets_fonts_and_textures() {
    let fixture = fixture();
    let config = config(&fixture);
    let sink = RecordingSink::default();

    let report = Pipeline::new(&config, &sink)
        .with_probe(NoProcessProbe)
        .run()
        .expect("run");

    assert_eq!(
        report,
        RunReport {
            queued: 3,
            skipped: 2,
            injected: 3,
            failed: 0,
            indexes_written: 3,
            dry_run: false,
        }
    );

    let mut reader = SqPackReader::new(&fixture.install);

    // Sheet page: row 3 carries the patched number and string
    let page = reader
        .read_entry(&fixture.sheets, EntryAddress::from_path("exd/item_0_en.exd"))
        .expect("read")
        .expect("page");
    let page = ExdSheet::parse(&page).expect("parse");
    let mut expected = vec![0, 0, 0, 16, 0, 1];
    expected.extend_from_slice(&42u32.to_be_bytes());
    expected.extend_from_slice(&0u32.to_be_bytes());
    expected.extend_from_slice(b"hello\0\0\0");
    assert_eq!(page.rows.get(&3), Some(&expected));

    // Font table: base glyphs kept, overlay fills the gap
    let font = reader
        .read_entry(&fixture.common, EntryAddress::from_path("common/font/axis_12.fdt"))
        .expect("read")
        .expect("font");
    let font = FontTable::parse(&font).expect("parse");
    let code_points: Vec<u32> = font.glyphs.iter().map(|g| g.code_point).collect();
    assert_eq!(code_points, vec![65, 66, 67]);
    assert_eq!(font.glyph(66).map(|g| g.advance), Some(8));

    // Texture: not indexed anywhere, lands in the common repository
    let texture = EntryAddress::from_path("common/font/font1.tex");
    assert!(
        reader
            .read_entry(&fixture.common, texture)
            .expect("read")
            .is_some()
    );
    let secondary = IndexBuffer::from_bytes(
        std::fs::read(
            fixture
                .install
                .index_path(&fixture.common, IndexKind::Secondary),
        )
        .expect("read"),
        IndexKind::Secondary,
    )
    .expect("parse");
    assert!(secondary.lookup(texture).is_some());
    assert!(secondary.verify_checksum(0));

    let lines = sink.lines.borrow();
    assert!(lines.iter().any(|l| l == "Skipping excluded file rawexd/exd/skipped.csv"));
    assert!(
        lines
            .iter()
            .any(|l| l.starts_with("Skipping common/graphics/dummy.tex"))
    );
}

#[test]
fn texture_without_secondary_index_is_still_injected() {
    let fixture = fixture();
    let secondary = fixture
        .install
        .index_path(&fixture.common, IndexKind::Secondary);
    std::fs::remove_file(&secondary).expect("remove index2");
    let config = config(&fixture);

    let report = Pipeline::new(&config, &RecordingSink::default())
        .with_probe(NoProcessProbe)
        .run()
        .expect("run");

    assert_eq!(report.injected, 3);
    assert_eq!(report.failed, 0);
    // Both primary indexes, no .index2 written
    assert_eq!(report.indexes_written, 2);
    assert!(!secondary.exists());

    let mut reader = SqPackReader::new(&fixture.install);
    assert!(
        reader
            .read_entry(&fixture.common, EntryAddress::from_path("common/font/font1.tex"))
            .expect("read")
            .is_some()
    );
}

#[test]
fn dry_run_leaves_archives_untouched() {
    let fixture = fixture();
    let config = config(&fixture).with_dry_run(true);
    let index = fixture
        .install
        .index_path(&fixture.sheets, IndexKind::Primary);
    let body = fixture.install.body_path(&fixture.sheets, 0);
    let index_before = std::fs::read(&index).expect("read");
    let body_before = std::fs::read(&body).expect("read");

    let report = Pipeline::new(&config, &RecordingSink::default())
        .with_probe(NoProcessProbe)
        .run()
        .expect("run");

    assert!(report.dry_run);
    assert_eq!(report.queued, 3);
    assert_eq!(report.injected, 3);
    assert_eq!(report.indexes_written, 0);
    assert_eq!(std::fs::read(&index).expect("read"), index_before);
    assert_eq!(std::fs::read(&body).expect("read"), body_before);
}

#[test]
fn cancelled_run_keeps_index_files() {
    let fixture = fixture();
    let config = config(&fixture);
    let index = fixture
        .install
        .index_path(&fixture.sheets, IndexKind::Primary);
    let index_before = std::fs::read(&index).expect("read");

    let token = CancellationToken::new();
    let sink = CancelOnProgress(token.clone());
    let result = Pipeline::new(&config, &sink)
        .with_probe(NoProcessProbe)
        .with_cancellation(token)
        .run();

    assert!(matches!(result, Err(PatchError::Cancelled)));
    assert_eq!(std::fs::read(&index).expect("read"), index_before);

    // The original page is still what the index points at
    let mut reader = SqPackReader::new(&fixture.install);
    let page = reader
        .read_entry(&fixture.sheets, EntryAddress::from_path("exd/item_0_en.exd"))
        .expect("read")
        .expect("page");
    assert_eq!(page, item_sheet().1);
}
