//! Patch run configuration.
//!
//! Configuration can be provided via:
//! - CLI arguments (`--game-root`, `--resource-root`, etc.)
//! - Environment variables (`XIVPATCH_GAME`, `XIVPATCH_RESOURCES`, etc.)
//! - A serialized [`PatchConfig`] built by another front end
//!
//! # Example
//!
//! ```no_run
//! use xivpatch_injector::{Language, PatchConfig};
//!
//! let config = PatchConfig::new("/games/ffxiv/game", "/patches/zh")
//!     .with_language(Language::ChineseSimplified)
//!     .with_dry_run(true);
//!
//! config.validate().expect("Invalid configuration");
//! ```

use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use xivpatch_formats::fdt::{MergeOptions, MergeStrategy};
use xivpatch_storage::layout::SQPACK_DIR;

/// Client language, selecting which localised sheet pages are patched
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    /// Japanese (`ja`)
    #[value(alias = "ja")]
    Japanese,
    /// English (`en`)
    #[default]
    #[value(alias = "en")]
    English,
    /// German (`de`)
    #[value(alias = "de")]
    German,
    /// French (`fr`)
    #[value(alias = "fr")]
    French,
    /// Simplified Chinese (`chs`)
    #[value(alias = "chs")]
    ChineseSimplified,
    /// Traditional Chinese (`cht`)
    #[value(alias = "cht")]
    ChineseTraditional,
    /// Korean (`ko`)
    #[value(alias = "ko")]
    Korean,
}

impl Language {
    /// Suffix of this language's sheet pages (`item_0_en.exd`)
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Japanese => "ja",
            Self::English => "en",
            Self::German => "de",
            Self::French => "fr",
            Self::ChineseSimplified => "chs",
            Self::ChineseTraditional => "cht",
            Self::Korean => "ko",
        }
    }
}

/// Conflict policy when merging font tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FontMergeMode {
    /// Shipped glyphs win; patch glyphs only fill gaps
    PreferBase,
    /// Patch glyphs replace shipped glyphs with the same code point
    PreferOverlay,
}

impl From<FontMergeMode> for MergeStrategy {
    fn from(mode: FontMergeMode) -> Self {
        match mode {
            FontMergeMode::PreferBase => Self::PreferBase,
            FontMergeMode::PreferOverlay => Self::PreferOverlay,
        }
    }
}

/// Patch run configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Parser, Serialize, Deserialize)]
#[command(
    name = "xivpatch",
    about = "Inject translated sheets, fonts and textures into SqPack archives",
    version
)]
pub struct PatchConfig {
    /// Game directory (the one holding `sqpack/`)
    #[arg(long, env = "XIVPATCH_GAME")]
    pub game_root: PathBuf,

    /// Directory holding the patch files
    #[arg(long, env = "XIVPATCH_RESOURCES")]
    pub resource_root: PathBuf,

    /// Client language whose sheet pages are patched
    #[arg(long, env = "XIVPATCH_LANGUAGE", value_enum, default_value_t = Language::English)]
    #[serde(default)]
    pub language: Language,

    /// Only patch these relative paths (comma-separated)
    #[arg(long = "only", env = "XIVPATCH_ONLY", value_delimiter = ',')]
    #[serde(default)]
    pub file_filter: Vec<String>,

    /// JSON exclusion rules (`third-party` array)
    #[arg(long, env = "XIVPATCH_EXCLUSIONS")]
    #[serde(default)]
    pub exclusion_rules: Option<PathBuf>,

    /// Merge font tables into the shipped ones instead of replacing them
    #[arg(long = "merge-fonts", env = "XIVPATCH_MERGE_FONTS", value_enum)]
    #[serde(default)]
    pub font_merge: Option<FontMergeMode>,

    /// First texture slot for merged glyphs
    #[arg(long, env = "XIVPATCH_FONT_SLOT")]
    #[serde(default)]
    pub font_target_slot: Option<u16>,

    /// Scale 1K shipped font tables up to a 4K patch before merging
    #[arg(long, env = "XIVPATCH_PROMOTE_FONTS")]
    #[serde(default)]
    pub promote_fonts: bool,

    /// Encode everything but leave the archives untouched
    #[arg(long, env = "XIVPATCH_DRY_RUN")]
    #[serde(default)]
    pub dry_run: bool,
}

impl PatchConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Configuration with defaults for everything but the two directories
    pub fn new(game_root: impl Into<PathBuf>, resource_root: impl Into<PathBuf>) -> Self {
        Self {
            game_root: game_root.into(),
            resource_root: resource_root.into(),
            language: Language::default(),
            file_filter: Vec::new(),
            exclusion_rules: None,
            font_merge: None,
            font_target_slot: None,
            promote_fonts: false,
            dry_run: false,
        }
    }

    /// Set the client language
    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Restrict the run to these relative paths
    #[must_use]
    pub fn with_file_filter<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_filter = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Load exclusion rules from `path`
    #[must_use]
    pub fn with_exclusion_rules(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclusion_rules = Some(path.into());
        self
    }

    /// Merge font tables with the given settings
    #[must_use]
    pub fn with_font_merge(mut self, options: MergeOptions) -> Self {
        self.font_merge = Some(match options.strategy {
            MergeStrategy::PreferBase => FontMergeMode::PreferBase,
            MergeStrategy::PreferOverlay => FontMergeMode::PreferOverlay,
        });
        self.font_target_slot = options.target_slot;
        self.promote_fonts = options.promote_low_resolution_base;
        self
    }

    /// Encode without touching the archives
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Normalized relative-path filter, `None` when every input participates
    pub fn filter_set(&self) -> Option<BTreeSet<String>> {
        if self.file_filter.is_empty() {
            return None;
        }
        Some(
            self.file_filter
                .iter()
                .map(|path| normalize_filter_path(path))
                .collect(),
        )
    }

    /// Font merge settings, `None` when patch fonts replace the shipped ones
    pub fn font_merge_options(&self) -> Option<MergeOptions> {
        self.font_merge.map(|mode| MergeOptions {
            strategy: mode.into(),
            target_slot: self.font_target_slot,
            promote_low_resolution_base: self.promote_fonts,
        })
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The game directory has no `sqpack` folder
    /// - The resource directory doesn't exist
    /// - Font slot or promotion settings are given without a merge mode
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.game_root.join(SQPACK_DIR).is_dir() {
            return Err(ConfigError::GameRootMissing(self.game_root.clone()));
        }

        if !self.resource_root.is_dir() {
            return Err(ConfigError::ResourceRootMissing(self.resource_root.clone()));
        }

        if self.font_merge.is_none() && (self.font_target_slot.is_some() || self.promote_fonts) {
            return Err(ConfigError::FontMerge(
                "font slot and promotion require a merge mode".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalize_filter_path(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .to_lowercase()
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_language_suffixes() {
        assert_eq!(Language::Japanese.suffix(), "ja");
        assert_eq!(Language::English.suffix(), "en");
        assert_eq!(Language::German.suffix(), "de");
        assert_eq!(Language::French.suffix(), "fr");
        assert_eq!(Language::ChineseSimplified.suffix(), "chs");
        assert_eq!(Language::ChineseTraditional.suffix(), "cht");
        assert_eq!(Language::Korean.suffix(), "ko");
    }

    #[test]
    fn test_cli_parsing() {
        let config = PatchConfig::try_parse_from([
            "xivpatch",
            "--game-root",
            "/games/xiv",
            "--resource-root",
            "/patches",
            "--language",
            "chs",
            "--only",
            "rawexd/exd/Item.csv,font/axis_12.fdt",
            "--merge-fonts",
            "prefer-overlay",
            "--font-target-slot",
            "4",
        ])
        .expect("parse");

        assert_eq!(config.language, Language::ChineseSimplified);
        assert_eq!(config.file_filter.len(), 2);
        assert_eq!(
            config.font_merge_options(),
            Some(MergeOptions {
                strategy: MergeStrategy::PreferOverlay,
                target_slot: Some(4),
                promote_low_resolution_base: false,
            })
        );
        assert!(!config.dry_run);
    }

    #[test]
    fn test_filter_set_is_normalized() {
        let config = PatchConfig::new("/g", "/r")
            .with_file_filter(["RawExd\\Exd\\Item.csv", "./font/Axis_12.fdt"]);
        let filter = config.filter_set().expect("filter");

        assert!(filter.contains("rawexd/exd/item.csv"));
        assert!(filter.contains("font/axis_12.fdt"));
        assert_eq!(PatchConfig::new("/g", "/r").filter_set(), None);
    }

    #[test]
    fn test_font_merge_round_trips_through_builder() {
        let options = MergeOptions {
            strategy: MergeStrategy::PreferBase,
            target_slot: None,
            promote_low_resolution_base: true,
        };
        let config = PatchConfig::new("/g", "/r").with_font_merge(options);
        assert_eq!(config.font_merge_options(), Some(options));
    }

    #[test]
    fn test_serde_defaults() {
        let config: PatchConfig =
            serde_json::from_str(r#"{"game_root": "/g", "resource_root": "/r", "language": "german"}"#)
                .expect("deserialize");
        assert_eq!(config, PatchConfig::new("/g", "/r").with_language(Language::German));
    }

    #[test]
    fn test_validate() {
        let game = tempdir().expect("tempdir");
        let resources = tempdir().expect("tempdir");

        let config = PatchConfig::new(game.path(), resources.path());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GameRootMissing(_))
        ));

        std::fs::create_dir(game.path().join("sqpack")).expect("mkdir");
        assert!(config.validate().is_ok());

        let missing = PatchConfig::new(game.path(), resources.path().join("nope"));
        assert!(matches!(
            missing.validate(),
            Err(ConfigError::ResourceRootMissing(_))
        ));

        let mut slot_only = config;
        slot_only.font_target_slot = Some(2);
        assert!(matches!(slot_only.validate(), Err(ConfigError::FontMerge(_))));
    }
}
