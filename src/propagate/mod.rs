use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread;

use serde::Serialize;

use crate::conflict::Resolution;
use crate::error::SyncError;
use crate::path::SyncPath;
use crate::progress::ProgressCallback;
use crate::reconcile::ChangeKind;
use crate::replica::Replica;
use crate::state::{FileRecord, Marker};
use crate::Side;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
/// The single operation that brings a path back into agreement.
pub enum Action {
    /// Copy the file from the other side to this side, where it does not exist yet.
    Create(Side),
    /// Copy the file from the other side over this side's copy.
    Update(Side),
    Delete(Side),
    /// Nothing to transfer, only the snapshot record changes.
    RefreshSnapshot,
}

impl Action {
    /// The action for a change declared on `side` alone, which is applied to the other side.
    pub fn for_change(side: Side, kind: ChangeKind) -> Action {
        let target = side.other();
        match kind {
            ChangeKind::New => Action::Create(target),
            ChangeKind::Updated => Action::Update(target),
            ChangeKind::Deleted => Action::Delete(target),
        }
    }

    /// `None` for unresolved conflicts, which get no action at all.
    pub fn for_resolution(resolution: Resolution) -> Option<Action> {
        match resolution {
            Resolution::NoOp => Some(Action::RefreshSnapshot),
            Resolution::PropagateLocalToRemote => Some(Action::Update(Side::Remote)),
            Resolution::PropagateRemoteToLocal => Some(Action::Update(Side::Local)),
            Resolution::Unresolved { .. } => None,
        }
    }

    /// The side that is modified.
    pub fn target(&self) -> Option<Side> {
        match *self {
            Action::Create(side) | Action::Update(side) | Action::Delete(side) => Some(side),
            Action::RefreshSnapshot => None,
        }
    }

    fn name(&self) -> &'static str {
        match *self {
            Action::Create(_) => "create",
            Action::Update(_) => "update",
            Action::Delete(_) => "delete",
            Action::RefreshSnapshot => "refresh",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.target() {
            Some(side) => write!(f, "{} on {}", self.name(), side),
            None => write!(f, "refresh snapshot"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub path: SyncPath,
    pub action: Action,
    /// What collection saw at `path`. Nothing is touched if a side no longer matches.
    pub observed: FileRecord,
}

#[derive(Debug)]
pub struct Outcome {
    pub planned: PlannedAction,
    /// The record to save for the path, `None` if the path is gone from both sides.
    pub result: Result<Option<FileRecord>, SyncError>,
}

/// Applies one action and returns the record that now describes the path.
///
/// Markers of modified files are read back from the side that was written,
/// never derived from the source.
pub fn apply<'a>(
    planned: &PlannedAction,
    local: &'a dyn Replica,
    remote: &'a dyn Replica,
) -> Result<Option<FileRecord>, SyncError> {
    let replica = |side: Side| -> &'a dyn Replica {
        match side {
            Side::Local => local,
            Side::Remote => remote,
        }
    };
    let path = &planned.path;
    let observed = &planned.observed;

    match planned.action {
        Action::RefreshSnapshot => {
            debug!("Refreshing snapshot record of {}", path);
            Ok(Some(*observed))
        }
        Action::Create(target) | Action::Update(target) => {
            let source = target.other();
            check_unchanged(replica(source), source, path, observed.marker(source))?;
            check_unchanged(replica(target), target, path, observed.marker(target))?;

            info!("Transferring {} from {} to {}", path, source, target);
            let contents = replica(source)
                .read(path)
                .map_err(|e| SyncError::action("read", source, e))?;
            let marker = replica(target)
                .write(path, &contents)
                .map_err(|e| SyncError::action(planned.action.name(), target, e))?;
            Ok(Some(observed.with_marker(target, marker)))
        }
        Action::Delete(target) => {
            let source = target.other();
            check_unchanged(replica(source), source, path, observed.marker(source))?;
            check_unchanged(replica(target), target, path, observed.marker(target))?;

            info!("Removing {} from {}", path, target);
            replica(target)
                .delete(path)
                .map_err(|e| SyncError::action("delete", target, e))?;
            Ok(None)
        }
    }
}

fn check_unchanged(
    replica: &dyn Replica,
    side: Side,
    path: &SyncPath,
    expected: Option<Marker>,
) -> Result<(), SyncError> {
    let now = replica
        .stat(path)
        .map_err(|e| SyncError::action("stat", side, e))?;
    if now != expected {
        warn!("{} changed on {} since it was observed ({:?} -> {:?})", path, side, expected, now);
        return Err(SyncError::PathModified { side });
    }
    Ok(())
}

/// Applies the actions on up to `workers` threads.
///
/// Every planned path is distinct, so no two workers ever touch the same
/// file. Outcomes are returned sorted by path.
pub fn execute<P>(
    actions: Vec<PlannedAction>,
    local: &dyn Replica,
    remote: &dyn Replica,
    workers: usize,
    progress: &P,
) -> Vec<Outcome>
where
    P: ProgressCallback,
{
    let total = actions.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = workers.max(1).min(total);
    debug!("Applying {} actions on {} workers", total, workers);

    let queue = Mutex::new(actions.into_iter());
    let done = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let sender = sender.clone();
            let queue = &queue;
            let done = &done;
            scope.spawn(move || loop {
                let next = queue.lock().unwrap_or_else(PoisonError::into_inner).next();
                let planned = match next {
                    Some(planned) => planned,
                    None => break,
                };

                let result = apply(&planned, local, remote);
                if let Err(ref e) = result {
                    warn!("Could not {} {}: {}", planned.action, planned.path, e);
                }
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                progress.action_finished(&planned.path, planned.action, finished, total);

                if sender.send(Outcome { planned, result }).is_err() {
                    break;
                }
            });
        }
    });
    drop(sender);

    let mut outcomes: Vec<Outcome> = receiver.into_iter().collect();
    outcomes.sort_by(|a, b| a.planned.path.cmp(&b.planned.path));
    outcomes
}
