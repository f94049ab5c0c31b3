//! Exclusion rules for compatibility with third-party patches.
//!
//! Rules come from a JSON document shaped like:
//!
//! ```json
//! { "third-party": [
//!     { "path": "rawexd/exd/Item.csv", "type": "File" },
//!     { "path": "exd/Action.csv", "type": "Key", "Key": [12, 13] },
//!     { "path": "exd/Addon.csv", "type": "Offset", "Offset": [4] }
//! ] }
//! ```
//!
//! Paths are matched against the input's internal path (lower-case, without
//! `rawexd/`). An unknown or missing type excludes the whole file; a key or
//! offset rule with no values does nothing.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Exclusion rule loading errors.
#[derive(Debug, Error)]
pub enum RulesError {
    /// Failed to read the rules file
    #[error("Failed to read exclusion rules from {}: {source}", .path.display())]
    LoadFailed {
        /// Rules file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid JSON in the rules file
    #[error("Invalid JSON in exclusion rules: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RulesDocument {
    #[serde(rename = "third-party", default)]
    third_party: Option<Vec<RuleEntry>>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "type", alias = "Type", default)]
    kind: Option<String>,
    #[serde(rename = "Key", alias = "key", alias = "keys", default)]
    keys: Option<Vec<i64>>,
    #[serde(rename = "Offset", alias = "offset", alias = "offsets", default)]
    offsets: Option<Vec<i64>>,
}

/// Loaded exclusion rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    files: HashSet<String>,
    keys: HashMap<String, HashSet<u32>>,
    offsets: HashMap<String, HashSet<u32>>,
}

impl ExclusionRules {
    /// Parse rules from JSON text
    pub fn parse(json: &str) -> Result<Self, RulesError> {
        let document: RulesDocument = serde_json::from_str(json)?;
        let mut rules = Self::default();

        for entry in document.third_party.unwrap_or_default() {
            let Some(path) = entry.path.filter(|p| !p.is_empty()) else {
                continue;
            };
            let path = normalize_rule_path(&path);
            let kind = entry.kind.unwrap_or_default();

            if kind.eq_ignore_ascii_case("key") {
                let keys = to_u32_set(entry.keys);
                if !keys.is_empty() {
                    rules.keys.entry(path).or_default().extend(keys);
                }
            } else if kind.eq_ignore_ascii_case("offset") {
                let offsets = to_u32_set(entry.offsets);
                if !offsets.is_empty() {
                    rules.offsets.entry(path).or_default().extend(offsets);
                }
            } else {
                rules.files.insert(path);
            }
        }

        debug!(
            "Loaded exclusion rules: {} files, {} key sets, {} offset sets",
            rules.files.len(),
            rules.keys.len(),
            rules.offsets.len()
        );
        Ok(rules)
    }

    /// Load rules from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RulesError::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&json)
    }

    /// Check if the whole input at `internal` is excluded
    pub fn excludes_file(&self, internal: &str) -> bool {
        self.files.contains(internal)
    }

    /// Row keys to drop from the patch table at `internal`
    pub fn excluded_keys(&self, internal: &str) -> Option<&HashSet<u32>> {
        self.keys.get(internal)
    }

    /// Column offsets never to patch for the table at `internal`
    pub fn excluded_offsets(&self, internal: &str) -> Option<&HashSet<u32>> {
        self.offsets.get(internal)
    }

    /// Number of paths with at least one rule
    pub fn len(&self) -> usize {
        self.files.len() + self.keys.len() + self.offsets.len()
    }

    /// Check if no rule is loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_rule_path(path: &str) -> String {
    let path = path.replace('\\', "/").to_lowercase();
    match path.strip_prefix("rawexd/") {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

fn to_u32_set(values: Option<Vec<i64>>) -> HashSet<u32> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| u32::try_from(v).ok())
        .collect()
}
