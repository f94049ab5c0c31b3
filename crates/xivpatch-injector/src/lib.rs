//! SqPack patch injector.
//!
//! This crate drives a patch run against an installed game: it discovers
//! patch files, merges translated sheet tables into the shipped sheet pages,
//! repairs or merges font tables, and writes everything into the archives
//! through `xivpatch-storage`.
//!
//! # Architecture
//!
//! - `config`: Run configuration (CLI, environment, serde)
//! - `inputs`: Patch file discovery and path normalization
//! - `exclusions`: Third-party compatibility rules
//! - `process`: Running game detection
//! - `sink`: Progress reporting and cancellation
//! - `pipeline`: The run itself
//!
//! # Example
//!
//! ```no_run
//! use xivpatch_injector::{Pipeline, PatchConfig, TracingSink};
//!
//! fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let config = PatchConfig::from_args();
//!     config.validate()?;
//!
//!     let report = Pipeline::new(&config, &TracingSink).run()?;
//!     println!("{report}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::cast_precision_loss)] // Progress fractions

// Module declarations
pub mod config;
pub mod error;
pub mod exclusions;
pub mod inputs;
pub mod pipeline;
pub mod process;
pub mod sink;

// Re-exports for public API
pub use config::{FontMergeMode, Language, PatchConfig};
pub use error::{ConfigError, ItemError, PatchError};
pub use exclusions::{ExclusionRules, RulesError};
pub use inputs::{InputKind, PatchInput};
pub use pipeline::{Pipeline, RunReport};
pub use process::{NoProcessProbe, ProcProbe, ProcessProbe};
pub use sink::{CancellationToken, PatchSink, TracingSink};
