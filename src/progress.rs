use crate::path::SyncPath;
use crate::propagate::Action;
use crate::Side;

/// Progress reporting for a sync run.
///
/// Callbacks arrive from the collection and worker threads, so
/// implementations must be `Sync`.
pub trait ProgressCallback: Sync {
    /// Called when a new directory is being read.
    fn reading_directory(&self, _side: Side, _path: &SyncPath, _read: usize, _remaining: usize) {}

    /// Called after an action finished, whether it succeeded or not.
    fn action_finished(&self, _path: &SyncPath, _action: Action, _done: usize, _total: usize) {}
}

/// A zero-sized struct with an empty implementation of ProgressCallback
pub struct EmptyProgressCallback;

impl ProgressCallback for EmptyProgressCallback {}
