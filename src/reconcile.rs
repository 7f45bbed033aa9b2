//! Classifying what changed since the last successful run.

use std::collections::btree_map::{self, BTreeMap};

use serde::Serialize;

use crate::error::SyncError;
use crate::path::SyncPath;
use crate::snapshot::Snapshot;
use crate::Side;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// How one side diverged from the saved snapshot.
pub enum ChangeKind {
    New,
    Updated,
    Deleted,
}

/// The changes declared for a single path, at most one per side.
///
/// A change declared for a side means that side diverged from the saved
/// state; the action that restores agreement is applied to the other side.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DeclaredChanges {
    local: Option<ChangeKind>,
    remote: Option<ChangeKind>,
}

impl DeclaredChanges {
    pub fn get(&self, side: Side) -> Option<ChangeKind> {
        match side {
            Side::Local => self.local,
            Side::Remote => self.remote,
        }
    }

    pub fn local(&self) -> Option<ChangeKind> {
        self.local
    }

    pub fn remote(&self) -> Option<ChangeKind> {
        self.remote
    }

    /// Both sides changed.
    pub fn is_conflict(&self) -> bool {
        self.local.is_some() && self.remote.is_some()
    }

    /// The single changed side, if only one side changed.
    pub fn single(&self) -> Option<(Side, ChangeKind)> {
        match (self.local, self.remote) {
            (Some(kind), None) => Some((Side::Local, kind)),
            (None, Some(kind)) => Some((Side::Remote, kind)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: BTreeMap<SyncPath, DeclaredChanges>,
}

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet::default()
    }

    /// Declares that `side` changed at `path`.
    ///
    /// A side can only change once per path; a second declaration means the
    /// classifier visited the path twice and fails with `DuplicateChangeDeclaration`.
    pub fn declare(&mut self, path: &SyncPath, side: Side, kind: ChangeKind) -> Result<(), SyncError> {
        let declared = self.changes.entry(path.clone()).or_insert_with(Default::default);
        let slot = match side {
            Side::Local => &mut declared.local,
            Side::Remote => &mut declared.remote,
        };
        if let Some(existing) = *slot {
            return Err(SyncError::DuplicateChangeDeclaration {
                path: path.clone(),
                side,
                existing,
                attempted: kind,
            });
        }
        info!("{:?} {} file: {}", kind, side, path);
        *slot = Some(kind);
        Ok(())
    }

    pub fn get(&self, path: &SyncPath) -> Option<&DeclaredChanges> {
        self.changes.get(path)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<SyncPath, DeclaredChanges> {
        self.changes.iter()
    }

    /// Paths that changed on both sides.
    pub fn conflicts(&self) -> impl Iterator<Item = (&SyncPath, &DeclaredChanges)> {
        self.changes.iter().filter(|(_, declared)| declared.is_conflict())
    }
}

/// The result of classification.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub changes: ChangeSet,
    /// Saved paths that are gone from both sides. They need no action and are
    /// dropped from the next snapshot.
    pub vanished: Vec<SyncPath>,
    /// Paths present now that did not change since the last run.
    pub unchanged: usize,
}

/// Compares the freshly observed snapshot against the saved one.
pub fn classify(current: &Snapshot, saved: &Snapshot) -> Result<Classification, SyncError> {
    let mut result = Classification::default();

    for (path, now) in current {
        match saved.get(path) {
            Some(before) => {
                let mut changed = false;
                for &side in &[Side::Local, Side::Remote] {
                    if now.marker(side) != before.marker(side) {
                        let kind = if now.marker(side).is_none() {
                            ChangeKind::Deleted
                        } else {
                            ChangeKind::Updated
                        };
                        result.changes.declare(path, side, kind)?;
                        changed = true;
                    }
                }
                if !changed {
                    trace!("{} unchanged", path);
                    result.unchanged += 1;
                }
            }
            None => match (now.local(), now.remote()) {
                (Some(_), None) => result.changes.declare(path, Side::Local, ChangeKind::New)?,
                (None, Some(_)) => result.changes.declare(path, Side::Remote, ChangeKind::New)?,
                // neither side is known to be authoritative, so let the
                // resolver compare the contents
                _ => {
                    result.changes.declare(path, Side::Local, ChangeKind::Updated)?;
                    result.changes.declare(path, Side::Remote, ChangeKind::Updated)?;
                }
            },
        }
    }

    for path in saved.paths() {
        if !current.contains(path) {
            debug!("{} was removed from both sides", path);
            result.vanished.push(path.clone());
        }
    }

    Ok(result)
}
