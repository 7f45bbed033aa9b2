use std::convert::TryFrom;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::Side;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
/// The last-modification point of a file on one side.
///
/// Markers are nanoseconds since the UNIX epoch. They are compared for
/// equality against the marker saved for the same side, and ordered against
/// the other side's marker when a conflict needs a tie-break; the latter is only
/// as accurate as the clocks of the two machines.
pub struct Marker(i64);

impl Marker {
    pub fn from_nanos(nanos: i64) -> Self {
        Marker(nanos)
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    /// Times before the epoch are kept as negative offsets. Times outside
    /// the range of an `i64` (past the year 2262) saturate.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Marker(i64::try_from(after.as_nanos()).unwrap_or(i64::MAX)),
            Err(before) => Marker(
                i64::try_from(before.duration().as_nanos())
                    .map(|nanos| -nanos)
                    .unwrap_or(i64::MIN),
            ),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Marker {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Marker)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
/// The markers of one path on both sides. At least one of them is present.
pub struct FileRecord {
    local: Option<Marker>,
    remote: Option<Marker>,
}

impl FileRecord {
    /// Returns `None` when both markers are absent, since such a record must not exist.
    pub fn new(local: Option<Marker>, remote: Option<Marker>) -> Option<Self> {
        if local.is_none() && remote.is_none() {
            None
        } else {
            Some(FileRecord { local, remote })
        }
    }

    pub fn local(&self) -> Option<Marker> {
        self.local
    }

    pub fn remote(&self) -> Option<Marker> {
        self.remote
    }

    pub fn marker(&self, side: Side) -> Option<Marker> {
        match side {
            Side::Local => self.local,
            Side::Remote => self.remote,
        }
    }

    /// Overwrites the markers that are supplied and keeps the others.
    pub(crate) fn merge(&mut self, local: Option<Marker>, remote: Option<Marker>) {
        if local.is_some() {
            self.local = local;
        }
        if remote.is_some() {
            self.remote = remote;
        }
    }

    /// Returns a copy with the marker of `side` replaced.
    pub fn with_marker(&self, side: Side, marker: Marker) -> FileRecord {
        let mut record = *self;
        match side {
            Side::Local => record.local = Some(marker),
            Side::Remote => record.remote = Some(marker),
        }
        record
    }
}
