use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::path::SyncPath;
use crate::replica::{DirEntry, EntryKind, Replica};
use crate::state::Marker;

/// A tree on a locally reachable filesystem. The remote side uses this too
/// when the share is mounted by the operating system.
#[derive(Debug, Clone)]
pub struct FsReplica {
    root: PathBuf,
}

impl FsReplica {
    pub fn new(root: PathBuf) -> Self {
        FsReplica { root }
    }

    fn native(&self, path: &SyncPath) -> PathBuf {
        path.to_native(&self.root)
    }
}

const PARTIAL_SUFFIX: &str = ".part";

/// Temporary files of `write`, left behind only if the process died mid-write.
fn is_partial_write(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)
}

fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

fn marker_of(metadata: &fs::Metadata) -> io::Result<Marker> {
    Ok(Marker::from_system_time(metadata.modified()?))
}

impl Replica for FsReplica {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn read_dir(&self, dir: &SyncPath) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for item in fs::read_dir(self.native(dir))? {
            let item = item?;
            let name = match item.file_name().into_string() {
                Ok(name) => name,
                Err(name) => {
                    warn!("Skipping {:?} in {}: name is not valid UTF-8", name, dir);
                    continue;
                }
            };
            if is_partial_write(&name) {
                debug!("Ignoring unfinished write {:?} in {}", name, dir);
                continue;
            }

            // links are never followed, a link to an ancestor would loop forever
            let metadata = match fs::symlink_metadata(item.path()) {
                Ok(metadata) => metadata,
                Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{:?} disappeared while listing {}", name, dir);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let file_type = metadata.file_type();
            let kind = if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File(marker_of(&metadata)?)
            } else {
                warn!("Skipping special file {:?}", item.path());
                continue;
            };
            entries.push(DirEntry { name, kind });
        }
        Ok(entries)
    }

    fn read(&self, path: &SyncPath) -> io::Result<Vec<u8>> {
        fs::read(self.native(path))
    }

    fn write(&self, path: &SyncPath, contents: &[u8]) -> io::Result<Marker> {
        let native = self.native(path);
        if let Some(parent) = native.parent() {
            if !parent.exists() {
                info!("Creating parent directory {:?}", parent);
                fs::create_dir_all(parent)?;
            }
        }

        // write next to the target and rename over it, so a half written
        // file is never visible under the real name
        let file_name = native
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = native.with_file_name(format!(
            ".{}.{}{}",
            file_name,
            std::process::id(),
            PARTIAL_SUFFIX
        ));
        let written = write_file(&temp, contents).and_then(|_| fs::rename(&temp, &native));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp) {
                debug!("Could not remove {:?}: {}", temp, cleanup);
            }
            return Err(e);
        }

        marker_of(&fs::metadata(&native)?)
    }

    fn delete(&self, path: &SyncPath) -> io::Result<()> {
        fs::remove_file(self.native(path))
    }

    fn stat(&self, path: &SyncPath) -> io::Result<Option<Marker>> {
        match fs::metadata(self.native(path)) {
            Ok(metadata) if metadata.is_dir() => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path),
            )),
            Ok(metadata) => marker_of(&metadata).map(Some),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
