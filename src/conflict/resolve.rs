use std::cmp::Ordering;

use crate::config::TieBreak;
use crate::conflict::{Conflict, Resolution};
use crate::error::SyncError;
use crate::reconcile::ChangeKind;
use crate::replica::Replica;
use crate::state::Marker;
use crate::Side;

/// Decides which side of a conflict wins.
///
/// Only an update on both sides has a policy: the contents are compared and,
/// if they differ, the newer marker wins. Every combination involving a new
/// or deleted file is reported as unresolved.
pub fn resolve<L, R>(
    conflict: &Conflict,
    local: &L,
    remote: &R,
    tie_break: TieBreak,
) -> Result<Resolution, SyncError>
where
    L: Replica + ?Sized,
    R: Replica + ?Sized,
{
    info!("Resolving conflict at {}", conflict.path);
    match (conflict.local, conflict.remote) {
        (ChangeKind::Updated, ChangeKind::Updated) => {}
        (l, r) => {
            warn!("No policy for {:?}/{:?} at {}, leaving it for the next run", l, r, conflict.path);
            return Ok(Resolution::Unresolved { local: l, remote: r });
        }
    }

    let (local_marker, remote_marker) = match (conflict.current.local(), conflict.current.remote()) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Ok(Resolution::Unresolved {
                local: conflict.local,
                remote: conflict.remote,
            })
        }
    };

    if contents_equal(conflict, local, remote)? {
        debug!("{} has identical contents on both sides", conflict.path);
        return Ok(Resolution::NoOp);
    }

    let winner = authoritative(local_marker, remote_marker, tie_break);
    debug!(
        "{} differs (local {}, remote {}), {} wins",
        conflict.path, local_marker, remote_marker, winner
    );
    Ok(Resolution::propagate_from(winner))
}

/// The side with the greater marker, or the tie-break side if they are equal.
pub fn authoritative(local: Marker, remote: Marker, tie_break: TieBreak) -> Side {
    match local.cmp(&remote) {
        Ordering::Greater => Side::Local,
        Ordering::Less => Side::Remote,
        Ordering::Equal => tie_break.side(),
    }
}

fn contents_equal<L, R>(conflict: &Conflict, local: &L, remote: &R) -> Result<bool, SyncError>
where
    L: Replica + ?Sized,
    R: Replica + ?Sized,
{
    let local_contents = local
        .read(&conflict.path)
        .map_err(|e| SyncError::action("compare", Side::Local, e))?;
    let remote_contents = remote
        .read(&conflict.path)
        .map_err(|e| SyncError::action("compare", Side::Remote, e))?;
    Ok(local_contents == remote_contents)
}
