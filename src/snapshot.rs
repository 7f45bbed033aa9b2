use std::collections::btree_map::{self, BTreeMap};

use crate::error::SyncError;
use crate::path::SyncPath;
use crate::state::{FileRecord, Marker};
use crate::Side;

/// The per-path state table of one observation point: the freshly observed
/// trees, the state saved by the last successful run, or the state about to be saved.
///
/// Iteration is sorted by path so logs and saved files are reproducible.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<SyncPath, FileRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot::default()
    }

    /// Merges the given markers into the record for `path`, creating it if needed.
    ///
    /// Markers that are not supplied keep their previous value, which lets the
    /// two sides of the same path be recorded by independent traversals.
    pub fn upsert(
        &mut self,
        path: SyncPath,
        local: Option<Marker>,
        remote: Option<Marker>,
    ) -> Result<(), SyncError> {
        if local.is_none() && remote.is_none() {
            return Err(SyncError::InvalidRecord(path));
        }
        match self.records.entry(path) {
            btree_map::Entry::Occupied(mut entry) => entry.get_mut().merge(local, remote),
            btree_map::Entry::Vacant(entry) => {
                if let Some(record) = FileRecord::new(local, remote) {
                    entry.insert(record);
                }
            }
        }
        Ok(())
    }

    /// Records one side's marker for `path`.
    pub fn upsert_side(&mut self, path: SyncPath, side: Side, marker: Marker) -> Result<(), SyncError> {
        match side {
            Side::Local => self.upsert(path, Some(marker), None),
            Side::Remote => self.upsert(path, None, Some(marker)),
        }
    }

    /// Replaces the whole record for `path`.
    pub fn insert(&mut self, path: SyncPath, record: FileRecord) {
        self.records.insert(path, record);
    }

    pub fn remove(&mut self, path: &SyncPath) -> Result<FileRecord, SyncError> {
        self.records
            .remove(path)
            .ok_or_else(|| SyncError::NotFound(path.clone()))
    }

    pub fn get(&self, path: &SyncPath) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn contains(&self, path: &SyncPath) -> bool {
        self.records.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<SyncPath, FileRecord> {
        self.records.iter()
    }

    pub fn paths(&self) -> btree_map::Keys<SyncPath, FileRecord> {
        self.records.keys()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a SyncPath, &'a FileRecord);
    type IntoIter = btree_map::Iter<'a, SyncPath, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
