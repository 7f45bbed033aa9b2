//! Two-way synchronization between a local directory tree and a network share.
//!
//! Every run observes both trees, compares them against the snapshot saved by
//! the previous successful run, and applies the one action per file that brings
//! the two sides back into agreement.

#[macro_use]
extern crate log;

use std::fmt;

use serde::Serialize;

pub mod archive;
pub mod config;
pub mod conflict;
pub mod detect;
pub mod error;
pub mod path;
pub mod progress;
pub mod propagate;
pub mod reconcile;
pub mod replica;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod sync;

pub use crate::archive::{Archive, SnapshotStore};
pub use crate::config::{Ignore, SyncConfig, SyncInfo, TieBreak};
pub use crate::error::SyncError;
pub use crate::path::SyncPath;
pub use crate::report::SyncReport;
pub use crate::snapshot::Snapshot;
pub use crate::state::{FileRecord, Marker};
pub use crate::sync::{reconcile_replicas, RunState, Syncer};

/// One of the two endpoints being synchronized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}
