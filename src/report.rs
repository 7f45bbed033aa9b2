use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::SyncError;
use crate::path::SyncPath;
use crate::propagate::Action;

/// The outcome of one run, accumulated as the run progresses and handed back
/// to the caller.
#[derive(Debug, Default, serde::Serialize)]
pub struct SyncReport {
    /// Every action decided on, in path order.
    pub planned: Vec<ActionReport>,
    /// The actions that were carried out successfully.
    pub applied: Vec<ActionReport>,
    /// Paths that did not change since the last run.
    pub unchanged: usize,
    /// Paths removed from both sides since the last run.
    pub converged_deletions: Vec<SyncPath>,
    /// Entries found while observing that cannot be synced.
    pub skipped: Vec<String>,
    /// Unresolved conflicts and failed actions. None of them aborted the run.
    pub errors: Vec<PathError>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ActionReport {
    pub path: SyncPath,
    pub action: Action,
}

/// A problem with a single path.
#[derive(Debug)]
pub struct PathError {
    pub path: SyncPath,
    pub error: SyncError,
}

impl Serialize for PathError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PathError", 2)?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

impl SyncReport {
    pub(crate) fn error(&mut self, path: &SyncPath, error: SyncError) {
        self.errors.push(PathError {
            path: path.clone(),
            error,
        });
    }

    /// Conflicts that no policy covers yet.
    pub fn unresolved(&self) -> impl Iterator<Item = &PathError> {
        self.errors
            .iter()
            .filter(|e| matches!(e.error, SyncError::UnresolvedConflict { .. }))
    }

    /// Actions that were attempted and failed.
    pub fn failed(&self) -> impl Iterator<Item = &PathError> {
        self.errors
            .iter()
            .filter(|e| !matches!(e.error, SyncError::UnresolvedConflict { .. }))
    }

    /// True if the two sides agree on every path that was looked at.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.skipped.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} applied, {} planned, {} unchanged, {} removed on both sides, {} unresolved, {} failed",
            self.applied.len(),
            self.planned.len(),
            self.unchanged,
            self.converged_deletions.len(),
            self.unresolved().count(),
            self.failed().count()
        )?;
        if self.dry_run {
            write!(f, " (dry run)")?;
        }
        Ok(())
    }
}
