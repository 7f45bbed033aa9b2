//! Deciding what to do when both sides changed the same file.

pub mod resolve;

use serde::Serialize;

use crate::path::SyncPath;
use crate::reconcile::ChangeKind;
use crate::state::FileRecord;
use crate::Side;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A path with declared changes on both sides.
pub struct Conflict {
    pub path: SyncPath,
    pub local: ChangeKind,
    pub remote: ChangeKind,
    /// The current observation of the path.
    pub current: FileRecord,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "kebab-case")]
/// The result of resolving a conflict.
pub enum Resolution {
    /// The contents are identical; only the snapshot needs refreshing.
    NoOp,
    PropagateLocalToRemote,
    PropagateRemoteToLocal,
    /// No policy covers this combination of changes. The path is left alone
    /// and evaluated again by the next run.
    Unresolved { local: ChangeKind, remote: ChangeKind },
}

impl Resolution {
    pub fn propagate_from(side: Side) -> Self {
        match side {
            Side::Local => Resolution::PropagateLocalToRemote,
            Side::Remote => Resolution::PropagateRemoteToLocal,
        }
    }
}
