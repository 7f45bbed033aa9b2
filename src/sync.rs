//! Sequencing a complete run.

use crate::archive::SnapshotStore;
use crate::config::{SyncConfig, SyncInfo};
use crate::conflict::resolve::resolve;
use crate::conflict::Conflict;
use crate::detect;
use crate::error::SyncError;
use crate::progress::ProgressCallback;
use crate::propagate::{self, Action, PlannedAction};
use crate::reconcile::classify;
use crate::replica::{FsReplica, Replica};
use crate::report::{ActionReport, SyncReport};
use crate::session::{Connector, Session};
use crate::snapshot::Snapshot;
use crate::Side;

/// The phases of a run, in order. A run that fails in any phase ends without
/// saving a snapshot, so the next run starts again from the previous one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Connected,
    Observed,
    Classified,
    Resolved,
    Executed,
    Persisted,
}

fn advance(state: &mut RunState, next: RunState) {
    debug!("{:?} -> {:?}", state, next);
    *state = next;
}

/// Runs a sync between the local tree and the share, one run per call to `sync`.
pub struct Syncer<C, S> {
    config: SyncConfig,
    connector: C,
    store: S,
    state: RunState,
    reached: RunState,
}

impl<C, S> Syncer<C, S>
where
    C: Connector,
    S: SnapshotStore,
{
    pub fn new(config: SyncConfig, connector: C, store: S) -> Self {
        Syncer {
            config,
            connector,
            store,
            state: RunState::Idle,
            reached: RunState::Idle,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The last phase the previous run completed. `Persisted` after a
    /// successful run, or the phase before the failure otherwise.
    pub fn reached(&self) -> RunState {
        self.reached
    }

    pub fn sync<P: ProgressCallback>(&mut self, progress: &P) -> Result<SyncReport, SyncError> {
        let result = self.run(progress);
        self.reached = self.state;
        if let Err(ref e) = result {
            error!("Sync aborted after {:?}: {}", self.state, e);
        }
        advance(&mut self.state, RunState::Idle);
        result
    }

    fn run<P: ProgressCallback>(&mut self, progress: &P) -> Result<SyncReport, SyncError> {
        let config = &self.config;
        let store = &self.store;
        let state = &mut self.state;

        if !config.local_root.is_dir() {
            return Err(SyncError::RootDoesntExist(config.local_root.clone()));
        }
        let _lock = store.lock()?;

        info!(
            "Syncing {:?} with {}",
            config.local_root,
            config.endpoint.unc()
        );
        let session = self.connector.open(
            &config.endpoint,
            &config.credentials,
            config.connect_timeout,
        )?;
        advance(state, RunState::Connected);

        let local = FsReplica::new(config.local_root.clone());
        let phases = run_phases(
            &local,
            session.replica(),
            || store.load(),
            &config.info,
            progress,
            state,
        );
        if let Err(e) = session.close() {
            warn!("Could not close the session cleanly: {}", e);
        }
        let (resolved, report) = phases?;

        if !config.info.dry_run {
            store.save(&resolved)?;
            advance(state, RunState::Persisted);
        }
        Ok(report)
    }
}

/// Observes, classifies, resolves and executes against two replicas, without
/// a session or a store.
///
/// Returns the snapshot to save for the next run together with the report.
/// In a dry run nothing is executed and the saved snapshot is returned as is.
pub fn reconcile_replicas<L, R, P>(
    local: &L,
    remote: &R,
    saved: &Snapshot,
    info: &SyncInfo,
    progress: &P,
) -> Result<(Snapshot, SyncReport), SyncError>
where
    L: Replica,
    R: Replica,
    P: ProgressCallback,
{
    let mut state = RunState::Connected;
    run_phases(local, remote, || Ok(saved.clone()), info, progress, &mut state)
}

fn run_phases<L, R, F, P>(
    local: &L,
    remote: &R,
    load: F,
    info: &SyncInfo,
    progress: &P,
    state: &mut RunState,
) -> Result<(Snapshot, SyncReport), SyncError>
where
    L: Replica,
    R: Replica,
    F: FnOnce() -> Result<Snapshot, SyncError>,
    P: ProgressCallback,
{
    // a failed enumeration ends the run here, before anything is compared
    let observed = detect::observe(local, remote, &info.ignore, progress)?;
    advance(state, RunState::Observed);

    let saved = load()?;
    let classification = classify(&observed.current, &saved)?;
    advance(state, RunState::Classified);

    let mut report = SyncReport {
        unchanged: classification.unchanged,
        skipped: observed.skipped,
        dry_run: info.dry_run,
        ..Default::default()
    };

    let mut resolved = saved.clone();
    for path in &classification.vanished {
        resolved.remove(path)?;
        report.converged_deletions.push(path.clone());
    }

    let mut planned = Vec::new();
    for (path, declared) in classification.changes.iter() {
        let current = match observed.current.get(path) {
            Some(record) => *record,
            None => continue,
        };

        let action = match (declared.local(), declared.remote()) {
            (Some(local_kind), Some(remote_kind)) => {
                let conflict = Conflict {
                    path: path.clone(),
                    local: local_kind,
                    remote: remote_kind,
                    current,
                };
                match resolve(&conflict, local, remote, info.tie_break) {
                    Ok(resolution) => match Action::for_resolution(resolution) {
                        Some(action) => action,
                        None => {
                            report.error(
                                path,
                                SyncError::UnresolvedConflict {
                                    local: local_kind,
                                    remote: remote_kind,
                                },
                            );
                            continue;
                        }
                    },
                    Err(e) if !e.is_fatal() => {
                        warn!("Could not resolve {}: {}", path, e);
                        report.error(path, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            (Some(kind), None) => Action::for_change(Side::Local, kind),
            (None, Some(kind)) => Action::for_change(Side::Remote, kind),
            (None, None) => continue,
        };

        info!("{}: {}", path, action);
        planned.push(PlannedAction {
            path: path.clone(),
            action,
            observed: current,
        });
    }
    advance(state, RunState::Resolved);

    report.planned = planned
        .iter()
        .map(|p| ActionReport {
            path: p.path.clone(),
            action: p.action,
        })
        .collect();

    if info.dry_run {
        info!("Dry run, {} actions not applied", planned.len());
        return Ok((saved, report));
    }

    let outcomes = propagate::execute(planned, local, remote, info.workers, progress);
    for outcome in outcomes {
        let path = outcome.planned.path;
        match outcome.result {
            Ok(record) => {
                match record {
                    Some(record) => resolved.insert(path.clone(), record),
                    None => {
                        if resolved.contains(&path) {
                            resolved.remove(&path)?;
                        }
                    }
                }
                report.applied.push(ActionReport {
                    path,
                    action: outcome.planned.action,
                });
            }
            // the path keeps its saved record and is looked at again next run
            Err(e) => report.error(&path, e),
        }
    }
    advance(state, RunState::Executed);

    info!("Sync finished: {}", report);
    Ok((resolved, report))
}
