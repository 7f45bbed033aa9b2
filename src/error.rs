use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::path::SyncPath;
use crate::reconcile::ChangeKind;
use crate::Side;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Enumerating one side failed. Nothing observed in this run may be compared.
    #[error("failed to read {side} entry {path:?}: {source}")]
    CollectionFailed {
        side: Side,
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("record for {0} would have neither a local nor a remote marker")]
    InvalidRecord(SyncPath),
    #[error("no record for {0}")]
    NotFound(SyncPath),
    /// The classifier visited the same path twice. Always a bug.
    #[error("{side} change for {path} declared twice ({existing:?}, then {attempted:?})")]
    DuplicateChangeDeclaration {
        path: SyncPath,
        side: Side,
        existing: ChangeKind,
        attempted: ChangeKind,
    },
    #[error("no resolution policy for a {local:?} local change against a {remote:?} remote change")]
    UnresolvedConflict { local: ChangeKind, remote: ChangeKind },
    #[error("{action} on the {side} side failed: {source}")]
    ActionFailed {
        action: &'static str,
        side: Side,
        #[source]
        source: io::Error,
    },
    #[error("the file on the {side} side was modified by another application")]
    PathModified { side: Side },
    #[error("the path {path:?} is invalid ({reason})")]
    InvalidPath { path: String, reason: &'static str },
    #[error("root does not exist: {0:?}")]
    RootDoesntExist(PathBuf),
    #[error("could not open a session to {endpoint}: {source}")]
    SessionFailed {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("no answer from {endpoint} within {timeout:?}")]
    SessionTimeout { endpoint: String, timeout: Duration },
    #[error("snapshot read error at {path:?}: {source}")]
    SnapshotRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot line {line} is malformed: {message}")]
    SnapshotParse { line: usize, message: String },
    #[error("snapshot write error at {path:?}: {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("lock acquisition failed for {path:?}")]
    LockFailed { path: PathBuf },
}

impl SyncError {
    pub fn collection(side: Side, path: impl Into<String>, source: io::Error) -> Self {
        SyncError::CollectionFailed {
            side,
            path: path.into(),
            source,
        }
    }

    pub fn action(action: &'static str, side: Side, source: io::Error) -> Self {
        SyncError::ActionFailed {
            action,
            side,
            source,
        }
    }

    /// Returns false for errors that only concern a single path. Those are
    /// collected into the run report instead of aborting the run.
    pub fn is_fatal(&self) -> bool {
        match *self {
            SyncError::UnresolvedConflict { .. }
            | SyncError::ActionFailed { .. }
            | SyncError::PathModified { .. } => false,
            _ => true,
        }
    }
}
