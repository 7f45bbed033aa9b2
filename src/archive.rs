use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::SyncError;
use crate::path::SyncPath;
use crate::snapshot::Snapshot;
use crate::state::Marker;

/// Where the snapshot of the last successful run is kept.
pub trait SnapshotStore {
    /// Held for the duration of a run.
    type Lock;

    /// Guards against two runs using the same snapshot at once.
    fn lock(&self) -> Result<Self::Lock, SyncError>;

    /// Loads the saved snapshot. A store that was never written yields an empty one.
    fn load(&self) -> Result<Snapshot, SyncError>;

    /// Replaces the saved snapshot. Either the whole snapshot is saved or the
    /// previous one stays in place.
    fn save(&self, snapshot: &Snapshot) -> Result<(), SyncError>;
}

/// A snapshot kept in a text file, one `path\tlocal\tremote` line per record.
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
}

/// Releases the run lock when dropped.
#[derive(Debug)]
pub struct ArchiveLock {
    file: File,
    path: PathBuf,
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Could not release lock {:?}: {}", self.path, e);
        }
    }
}

impl Archive {
    pub fn new(path: PathBuf) -> Self {
        Archive { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, |name| format!("{}.lock", name))
    }

    fn temp_path(&self) -> PathBuf {
        sibling(&self.path, |name| {
            format!(".{}.{}.tmp", name, std::process::id())
        })
    }
}

impl Default for Archive {
    fn default() -> Self {
        Archive::new(PathBuf::from("saves/main_save.tsv"))
    }
}

impl SnapshotStore for Archive {
    type Lock = ArchiveLock;

    fn lock(&self) -> Result<ArchiveLock, SyncError> {
        let path = self.lock_path();
        ensure_parent(&path)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| SyncError::SnapshotWrite {
                path: path.clone(),
                source: e,
            })?;
        file.try_lock_exclusive()
            .map_err(|_| SyncError::LockFailed { path: path.clone() })?;
        debug!("Locked {:?}", path);
        Ok(ArchiveLock { file, path })
    }

    fn load(&self) -> Result<Snapshot, SyncError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No snapshot at {:?}, starting from an empty one", self.path);
                return Ok(Snapshot::new());
            }
            Err(e) => {
                return Err(SyncError::SnapshotRead {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        let snapshot = read_snapshot(BufReader::new(file)).map_err(|e| match e {
            SyncError::SnapshotRead { source, .. } => SyncError::SnapshotRead {
                path: self.path.clone(),
                source,
            },
            e => e,
        })?;
        debug!("Loaded {} records from {:?}", snapshot.len(), self.path);
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), SyncError> {
        ensure_parent(&self.path)?;
        let temp_path = self.temp_path();
        let write_error = |e| SyncError::SnapshotWrite {
            path: temp_path.clone(),
            source: e,
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(write_error)?;
        file.lock_exclusive()
            .map_err(|_| SyncError::LockFailed {
                path: temp_path.clone(),
            })?;

        let mut out = BufWriter::new(&file);
        write_snapshot(&mut out, snapshot).map_err(write_error)?;
        out.flush().map_err(write_error)?;
        drop(out);
        file.sync_all().map_err(write_error)?;
        file.unlock().map_err(|_| SyncError::LockFailed {
            path: temp_path.clone(),
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| SyncError::SnapshotWrite {
            path: self.path.clone(),
            source: e,
        })?;
        debug!("Wrote {} records to {:?}", snapshot.len(), self.path);
        Ok(())
    }
}

/// Reads snapshot lines. Records without any marker are dropped.
pub fn read_snapshot<R: BufRead>(read: R) -> Result<Snapshot, SyncError> {
    let mut snapshot = Snapshot::new();
    for (index, line) in read.lines().enumerate() {
        let number = index + 1;
        let line = line.map_err(|e| SyncError::SnapshotRead {
            path: PathBuf::new(),
            source: e,
        })?;
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return Err(SyncError::SnapshotParse {
                line: number,
                message: format!("expected 3 fields, found {}", fields.len()),
            });
        }
        let path = SyncPath::new(fields[0]).map_err(|e| SyncError::SnapshotParse {
            line: number,
            message: e.to_string(),
        })?;
        let local = parse_marker(fields[1], number)?;
        let remote = parse_marker(fields[2], number)?;

        if local.is_none() && remote.is_none() {
            warn!("Dropping snapshot entry {} without markers (line {})", path, number);
            continue;
        }
        snapshot.upsert(path, local, remote)?;
    }
    Ok(snapshot)
}

/// Writes one line per record, sorted by path.
pub fn write_snapshot<W: Write>(out: &mut W, snapshot: &Snapshot) -> io::Result<()> {
    for (path, record) in snapshot {
        writeln!(
            out,
            "{}\t{}\t{}",
            path,
            OptionalMarker(record.local()),
            OptionalMarker(record.remote())
        )?;
    }
    Ok(())
}

struct OptionalMarker(Option<Marker>);

impl std::fmt::Display for OptionalMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.0 {
            Some(marker) => write!(f, "{}", marker),
            None => Ok(()),
        }
    }
}

fn parse_marker(field: &str, line: usize) -> Result<Option<Marker>, SyncError> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse()
        .map(Some)
        .map_err(|e| SyncError::SnapshotParse {
            line,
            message: format!("bad marker {:?}: {}", field, e),
        })
}

fn ensure_parent(path: &Path) -> Result<(), SyncError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            info!("Creating snapshot directory {:?}", parent);
            fs::create_dir_all(parent).map_err(|e| SyncError::SnapshotWrite {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        _ => Ok(()),
    }
}

fn sibling<F: FnOnce(&str) -> String>(path: &Path, name: F) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(name(&file_name))
}
