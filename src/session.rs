//! Reaching the remote side.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::SyncError;
use crate::path::SyncPath;
use crate::replica::{FsReplica, Replica};

/// Address of a directory on a network share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub server: String,
    pub port: u16,
    pub share: String,
    /// Directory below the share root, `/`-separated. Empty for the share root.
    pub path: String,
}

impl Endpoint {
    pub fn new(server: &str, share: &str, path: &str) -> Self {
        Endpoint {
            server: server.to_owned(),
            port: 445,
            share: share.to_owned(),
            path: path.to_owned(),
        }
    }

    /// `//server/share/path`
    pub fn unc(&self) -> String {
        let path = self.path.trim_matches('/');
        if path.is_empty() {
            format!("//{}/{}", self.server, self.share)
        } else {
            format!("//{}/{}/{}", self.server, self.share, path)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (port {})", self.unc(), self.port)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Credentials {
            username: username.to_owned(),
            password: password.to_owned(),
        }
    }

    pub fn anonymous() -> Self {
        Credentials::new("", "")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An established connection to the remote side.
///
/// A session is opened once before observation and closed once after the
/// actions ran. Its replica may be used from several threads at once.
pub trait Session {
    type Replica: Replica;

    fn replica(&self) -> &Self::Replica;

    fn close(self) -> Result<(), SyncError>;
}

/// Opens sessions. Only session establishment is subject to a timeout.
pub trait Connector {
    type Session: Session;

    fn open(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self::Session, SyncError>;
}

/// A share that the operating system has already mounted (CIFS, SMB via
/// gvfs, a mapped drive). Authentication happened at mount time, so the
/// credentials are not used.
#[derive(Debug, Clone)]
pub struct MountedShare {
    mount_point: PathBuf,
}

impl MountedShare {
    pub fn new(mount_point: PathBuf) -> Self {
        MountedShare { mount_point }
    }
}

#[derive(Debug)]
pub struct MountedSession {
    replica: FsReplica,
}

impl Session for MountedSession {
    type Replica = FsReplica;

    fn replica(&self) -> &FsReplica {
        &self.replica
    }

    fn close(self) -> Result<(), SyncError> {
        debug!("Closing session to {}", self.replica.describe());
        Ok(())
    }
}

impl Connector for MountedShare {
    type Session = MountedSession;

    fn open(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<MountedSession, SyncError> {
        let root = if endpoint.path.trim_matches('/').is_empty() {
            self.mount_point.clone()
        } else {
            SyncPath::new(&endpoint.path)?.to_native(&self.mount_point)
        };
        info!(
            "Opening {} as {:?} at {:?}",
            endpoint, credentials.username, root
        );

        // a hung network mount can block a stat forever, so probe on a
        // separate thread and give up after `timeout`
        let (sender, receiver) = mpsc::channel();
        let probe_root = root.clone();
        thread::spawn(move || {
            let _ = sender.send(fs::metadata(&probe_root));
        });

        let metadata = match receiver.recv_timeout(timeout) {
            Ok(result) => result.map_err(|e| SyncError::SessionFailed {
                endpoint: endpoint.unc(),
                source: e,
            })?,
            Err(_) => {
                return Err(SyncError::SessionTimeout {
                    endpoint: endpoint.unc(),
                    timeout,
                })
            }
        };
        if !metadata.is_dir() {
            return Err(SyncError::SessionFailed {
                endpoint: endpoint.unc(),
                source: io::Error::new(
                    io::ErrorKind::Other,
                    format!("{:?} is not a directory", root),
                ),
            });
        }

        Ok(MountedSession {
            replica: FsReplica::new(root),
        })
    }
}
