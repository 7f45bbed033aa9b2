use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::path::SyncPath;
use crate::session::{Credentials, Endpoint};
use crate::Side;

/// Where to sync and how to reach the share.
#[derive(Debug)]
pub struct SyncConfig {
    pub local_root: PathBuf,
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    /// Bounds session establishment only; nothing else in a run times out.
    pub connect_timeout: Duration,
    pub info: SyncInfo,
}

impl SyncConfig {
    pub fn new(local_root: PathBuf, endpoint: Endpoint, credentials: Credentials) -> Self {
        SyncConfig {
            local_root,
            endpoint,
            credentials,
            connect_timeout: Duration::from_secs(10),
            info: SyncInfo::new(),
        }
    }
}

/// The configuration for the reconciliation itself.
#[derive(Debug)]
pub struct SyncInfo {
    pub ignore: Ignore,
    pub tie_break: TieBreak,
    /// Upper bound on actions applied at the same time.
    pub workers: usize,
    /// Plan and report, but do not touch either side or the snapshot.
    pub dry_run: bool,
}

impl SyncInfo {
    pub fn new() -> Self {
        SyncInfo {
            ignore: Ignore::nothing(),
            tie_break: TieBreak::default(),
            workers: 4,
            dry_run: false,
        }
    }
}

impl Default for SyncInfo {
    fn default() -> Self {
        SyncInfo::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Picks the authoritative side when both sides changed a file to different
/// contents and carry the same marker.
pub enum TieBreak {
    PreferRemote,
    PreferLocal,
}

impl TieBreak {
    pub fn side(self) -> Side {
        match self {
            TieBreak::PreferRemote => Side::Remote,
            TieBreak::PreferLocal => Side::Local,
        }
    }
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::PreferRemote
    }
}

#[derive(Debug)]
/// Determines which files should be ignored when observing either side.
pub struct Ignore {
    pub regexes: Vec<Regex>,
    /// Ignored together with everything below them.
    pub paths: Vec<String>,
}

impl Ignore {
    /// An `Ignore` struct that ignores nothing
    pub fn nothing() -> Self {
        Ignore {
            regexes: Vec::new(),
            paths: Vec::new(),
        }
    }

    /// Checks if the path is on the ignore list.
    pub fn is_ignored(&self, path: &SyncPath) -> bool {
        for ignored in &self.paths {
            if let Ok(prefix) = SyncPath::new(ignored) {
                if path.starts_with(&prefix) {
                    return true;
                }
            }
        }
        self.regexes.iter().any(|regex| regex.is_match(path.as_str()))
    }
}
