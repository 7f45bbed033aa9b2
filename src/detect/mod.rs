//! Observing both sides.

use std::thread;

use crate::config::Ignore;
use crate::error::SyncError;
use crate::path::SyncPath;
use crate::progress::ProgressCallback;
use crate::replica::{EntryKind, Replica};
use crate::snapshot::Snapshot;
use crate::state::Marker;
use crate::Side;

/// An item found while enumerating one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub path: SyncPath,
    /// `None` for directories.
    pub marker: Option<Marker>,
}

/// Everything found on one side.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub observations: Vec<Observation>,
    /// Symlinks and names that cannot be expressed as a sync path.
    pub skipped: Vec<String>,
}

/// The result of observing both sides.
#[derive(Debug)]
pub struct Observed {
    pub current: Snapshot,
    pub skipped: Vec<String>,
}

/// Lists every file and directory below the root of `replica`.
///
/// Directories are kept on an explicit stack instead of recursing, so deep
/// trees cannot exhaust the call stack. Ignored paths are neither reported
/// nor descended into. Any I/O error aborts the enumeration: a partial
/// listing would make existing files look deleted.
pub fn enumerate<R, P>(
    replica: &R,
    side: Side,
    ignore: &Ignore,
    progress: &P,
) -> Result<Enumeration, SyncError>
where
    R: Replica + ?Sized,
    P: ProgressCallback,
{
    let mut result = Enumeration::default();
    let mut directories = vec![SyncPath::root()];
    let mut read_directories = 0;

    while let Some(dir) = directories.pop() {
        debug!("Reading {} dir {}", side, dir);
        progress.reading_directory(side, &dir, read_directories, directories.len());
        read_directories += 1;

        let mut entries = replica
            .read_dir(&dir)
            .map_err(|e| SyncError::collection(side, dir.as_str(), e))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        for entry in entries {
            let path = match dir.join(&entry.name) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping {} entry {:?} in {}: {}", side, entry.name, dir, e);
                    result.skipped.push(format!("{}: {}/{}", side, dir, entry.name));
                    continue;
                }
            };
            if ignore.is_ignored(&path) {
                info!("Ignoring {} entry {}", side, path);
                continue;
            }

            match entry.kind {
                EntryKind::Directory => {
                    trace!("Found {} directory {}", side, path);
                    directories.push(path.clone());
                    result.observations.push(Observation { path, marker: None });
                }
                EntryKind::Symlink => {
                    warn!("Skipping {} symlink {}", side, path);
                    result.skipped.push(format!("{}: {} (symlink)", side, path));
                }
                EntryKind::File(marker) => {
                    trace!("Found {} file {} ({})", side, path, marker);
                    result.observations.push(Observation {
                        path,
                        marker: Some(marker),
                    });
                }
            }
        }
    }

    Ok(result)
}

/// Builds the `current` snapshot from both sides.
///
/// The two sides are enumerated concurrently. Only files are recorded, each
/// with the marker of the side it was found on.
pub fn observe<L, R, P>(
    local: &L,
    remote: &R,
    ignore: &Ignore,
    progress: &P,
) -> Result<Observed, SyncError>
where
    L: Replica + ?Sized,
    R: Replica + ?Sized,
    P: ProgressCallback,
{
    let (local_result, remote_result) = thread::scope(|scope| {
        let local_handle = scope.spawn(|| enumerate(local, Side::Local, ignore, progress));
        let remote_result = enumerate(remote, Side::Remote, ignore, progress);
        let local_result = match local_handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (local_result, remote_result)
    });
    let local_enumeration = local_result?;
    let remote_enumeration = remote_result?;

    let mut current = Snapshot::new();
    let mut skipped = Vec::new();
    for (side, enumeration) in vec![
        (Side::Local, local_enumeration),
        (Side::Remote, remote_enumeration),
    ] {
        let mut files = 0;
        for observation in enumeration.observations {
            if let Some(marker) = observation.marker {
                current.upsert_side(observation.path, side, marker)?;
                files += 1;
            }
        }
        debug!("Observed {} {} files", files, side);
        skipped.extend(enumeration.skipped);
    }

    Ok(Observed { current, skipped })
}
