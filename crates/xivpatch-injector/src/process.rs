//! Running game client detection.
//!
//! Patching while the client runs corrupts its view of the archives, so a
//! run refuses to start when a game process is found.

use std::path::PathBuf;
use tracing::debug;

/// Process names of the game client
pub const GAME_PROCESS_NAMES: [&str; 2] = ["ffxiv_dx11", "ffxiv"];

/// Answers whether a game client is currently running
pub trait ProcessProbe {
    /// Name of a running game process, if any
    fn running_game(&self) -> Option<String>;
}

/// Probe that scans `/proc/<pid>/comm`
///
/// Hosts without a process file system always report "not running".
#[derive(Debug, Clone)]
pub struct ProcProbe {
    proc_root: PathBuf,
}

impl Default for ProcProbe {
    fn default() -> Self {
        Self::with_root("/proc")
    }
}

impl ProcProbe {
    /// Probe the system `/proc`
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe a process table mounted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: root.into(),
        }
    }
}

impl ProcessProbe for ProcProbe {
    fn running_game(&self) -> Option<String> {
        let entries = match std::fs::read_dir(&self.proc_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No process table at {}: {}", self.proc_root.display(), e);
                return None;
            }
        };

        for entry in entries.flatten() {
            let is_pid = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit()));
            if !is_pid {
                continue;
            }
            let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) else {
                continue;
            };
            let name = comm.trim();
            let name = name.strip_suffix(".exe").unwrap_or(name);
            if GAME_PROCESS_NAMES
                .iter()
                .any(|game| game.eq_ignore_ascii_case(name))
            {
                return Some(name.to_string());
            }
        }
        None
    }
}

/// Probe that never finds a game, for tests and offline installs
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProcessProbe;

impl ProcessProbe for NoProcessProbe {
    fn running_game(&self) -> Option<String> {
        None
    }
}
