//! File access on either side of a sync.

use std::io;

use crate::path::SyncPath;
use crate::state::Marker;

mod fs;

pub use crate::replica::fs::FsReplica;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File(Marker),
    /// Never followed or synced.
    Symlink,
}

/// Byte-level access to one tree. Paths are relative to the tree's root.
///
/// Implementations are shared between the worker threads of a run.
pub trait Replica: Send + Sync {
    /// A human readable location, used in logs.
    fn describe(&self) -> String;

    /// Lists a single directory, without descending into subdirectories.
    fn read_dir(&self, dir: &SyncPath) -> io::Result<Vec<DirEntry>>;

    fn read(&self, path: &SyncPath) -> io::Result<Vec<u8>>;

    /// Replaces the file (creating missing parent directories) and returns
    /// the marker read back from the written file.
    fn write(&self, path: &SyncPath, contents: &[u8]) -> io::Result<Marker>;

    fn delete(&self, path: &SyncPath) -> io::Result<()>;

    /// The current marker of a file, or `None` if nothing exists at `path`.
    fn stat(&self, path: &SyncPath) -> io::Result<Option<Marker>>;
}
