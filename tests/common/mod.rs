#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use bisync::replica::{DirEntry, EntryKind, Replica};
use bisync::{Marker, SyncPath};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn path(p: &str) -> SyncPath {
    SyncPath::new(p).unwrap()
}

pub fn marker(nanos: i64) -> Marker {
    Marker::from_nanos(nanos)
}

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: Vec<u8>,
    marker: Marker,
}

/// A replica kept in memory, with markers chosen by the test.
///
/// Writes stamp files from a per-replica clock, so markers written by a sync
/// are distinguishable from the ones a test put in place.
pub struct MemoryReplica {
    name: &'static str,
    files: Mutex<BTreeMap<String, MemoryFile>>,
    clock: AtomicI64,
    fail_listing: AtomicBool,
    fail_writes: AtomicBool,
    stat_offset: AtomicI64,
}

impl MemoryReplica {
    pub fn new(name: &'static str, clock_start: i64) -> Self {
        MemoryReplica {
            name,
            files: Mutex::new(BTreeMap::new()),
            clock: AtomicI64::new(clock_start),
            fail_listing: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            stat_offset: AtomicI64::new(0),
        }
    }

    pub fn put(&self, path: &str, contents: &str, at: i64) {
        self.files.lock().unwrap().insert(
            path.to_owned(),
            MemoryFile {
                contents: contents.as_bytes().to_vec(),
                marker: marker(at),
            },
        );
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|f| String::from_utf8(f.contents.clone()).unwrap())
    }

    pub fn marker_of(&self, path: &str) -> Option<Marker> {
        self.files.lock().unwrap().get(path).map(|f| f.marker)
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes `stat` disagree with listings, as if every file were modified
    /// right after being listed.
    pub fn shift_stat(&self, nanos: i64) {
        self.stat_offset.store(nanos, Ordering::SeqCst);
    }
}

impl Replica for MemoryReplica {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn read_dir(&self, dir: &SyncPath) -> io::Result<Vec<DirEntry>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "listing denied"));
        }
        let prefix = if dir.is_root() {
            String::new()
        } else {
            format!("{}/", dir)
        };
        let files = self.files.lock().unwrap();
        let mut entries = BTreeMap::new();
        for (path, file) in files.iter() {
            if let Some(rest) = path.strip_prefix(prefix.as_str()) {
                match rest.find('/') {
                    Some(i) => {
                        entries
                            .entry(rest[..i].to_owned())
                            .or_insert(EntryKind::Directory);
                    }
                    None => {
                        entries.insert(rest.to_owned(), EntryKind::File(file.marker));
                    }
                }
            }
        }
        Ok(entries
            .into_iter()
            .map(|(name, kind)| DirEntry { name, kind })
            .collect())
    }

    fn read(&self, path: &SyncPath) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path.as_str())
            .map(|f| f.contents.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn write(&self, path: &SyncPath, contents: &[u8]) -> io::Result<Marker> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        let stamp = marker(self.clock.fetch_add(1, Ordering::SeqCst));
        self.files.lock().unwrap().insert(
            path.as_str().to_owned(),
            MemoryFile {
                contents: contents.to_vec(),
                marker: stamp,
            },
        );
        Ok(stamp)
    }

    fn delete(&self, path: &SyncPath) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path.as_str())
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn stat(&self, path: &SyncPath) -> io::Result<Option<Marker>> {
        let offset = self.stat_offset.load(Ordering::SeqCst);
        Ok(self
            .marker_of(path.as_str())
            .map(|m| marker(m.as_nanos() + offset)))
    }
}
