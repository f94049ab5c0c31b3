//! Patch input discovery.
//!
//! A resource directory mirrors archive paths:
//!
//! ```text
//! rawexd/exd/item.csv    -> sheet "item", pages exd/item_<start>_<lang>.exd
//! exd/quest_0_en.exd     -> replaces the entry exd/quest_0_en.exd
//! font/axis_12.fdt       -> common/font/axis_12.fdt
//! font1.tex              -> common/font/font1.tex
//! ```

use crate::error::PatchError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Folder prefix of exported sheet trees
const RAW_SHEET_PREFIX: &str = "rawexd/";

/// Folder holding font tables and glyph textures
pub const FONT_FOLDER: &str = "common/font";

/// Recognized patch file kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputKind {
    /// `.csv` patch table, merged into every page of its sheet
    Sheet,
    /// `.exd` sheet page, replaces the entry as-is
    Page,
    /// `.fdt` font table
    Font,
    /// `.tex` texture
    Texture,
}

impl InputKind {
    /// Kind for a lower-case file extension
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "csv" => Some(Self::Sheet),
            "exd" => Some(Self::Page),
            "fdt" => Some(Self::Font),
            "tex" => Some(Self::Texture),
            _ => None,
        }
    }
}

/// One patch file found under the resource directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchInput {
    /// File on disk
    pub source: PathBuf,
    /// Lower-case path relative to the resource directory, `/`-separated
    pub relative: String,
    /// `relative` without the exported-sheet prefix
    pub internal: String,
    /// File kind
    pub kind: InputKind,
}

impl PatchInput {
    /// Describe `source`, or `None` if it is not a patch file
    pub fn new(root: &Path, source: &Path) -> Option<Self> {
        let relative = normalize_relative(source.strip_prefix(root).ok()?);
        let extension = relative.rsplit_once('.')?.1;
        let kind = InputKind::from_extension(extension)?;
        let internal = relative
            .strip_prefix(RAW_SHEET_PREFIX)
            .unwrap_or(&relative)
            .to_string();
        Some(Self {
            source: source.to_path_buf(),
            relative,
            internal,
            kind,
        })
    }

    /// Sheet name of a patch table (`exd/item.csv` -> `item`)
    pub fn sheet_name(&self) -> Option<&str> {
        if self.kind != InputKind::Sheet {
            return None;
        }
        let name = self.internal.strip_suffix(".csv")?;
        Some(name.strip_prefix("exd/").unwrap_or(name))
    }

    /// Archive entry path a loose asset replaces
    ///
    /// `font/...` lives under `common/font/...`, and textures or font tables
    /// at the top of the resource directory belong to `common/font`.
    pub fn asset_path(&self) -> String {
        if let Some(rest) = self.internal.strip_prefix("font/") {
            return format!("common/font/{rest}");
        }
        if !self.internal.contains('/')
            && matches!(self.kind, InputKind::Font | InputKind::Texture)
        {
            return format!("{FONT_FOLDER}/{}", self.internal);
        }
        self.internal.clone()
    }
}

/// Lower-case, `/`-separated form of a relative path
pub fn normalize_relative(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .trim_start_matches('/')
        .to_lowercase()
}

/// Every patch file under `root`, sorted by relative path
///
/// When `filter` is given only inputs whose relative path it contains are
/// returned.
pub fn discover(
    root: &Path,
    filter: Option<&BTreeSet<String>>,
) -> Result<Vec<PatchInput>, PatchError> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| PatchError::InputScan {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(input) = PatchInput::new(root, entry.path()) else {
            continue;
        };
        if filter.is_some_and(|filter| !filter.contains(&input.relative)) {
            debug!("Filtered out {}", input.relative);
            continue;
        }
        inputs.push(input);
    }
    inputs.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(inputs)
}
