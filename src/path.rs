use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::error::SyncError;

/// A path relative to a replica root, using `/` as the separator on every side.
///
/// The empty path names the root directory itself and is only used while
/// walking directories; files always have at least one component.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SyncPath(String);

impl SyncPath {
    pub fn root() -> Self {
        SyncPath(String::new())
    }

    /// Parses a relative path. Backslashes are treated as separators and
    /// leading separators are dropped, so `/a/b.txt` and `a\b.txt` both
    /// become `a/b.txt`.
    pub fn new(path: &str) -> Result<Self, SyncError> {
        let mut normalized = String::with_capacity(path.len());
        for component in path.split(|c: char| c == '/' || c == '\\') {
            if component.is_empty() {
                continue;
            }
            check_component(path, component)?;
            if !normalized.is_empty() {
                normalized.push('/');
            }
            normalized.push_str(component);
        }
        if normalized.is_empty() {
            return Err(SyncError::InvalidPath {
                path: path.to_owned(),
                reason: "empty path",
            });
        }
        Ok(SyncPath(normalized))
    }

    /// Appends a single directory entry name.
    pub fn join(&self, name: &str) -> Result<Self, SyncError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(SyncError::InvalidPath {
                path: name.to_owned(),
                reason: "not a single path component",
            });
        }
        check_component(name, name)?;
        if self.is_root() {
            Ok(SyncPath(name.to_owned()))
        } else {
            Ok(SyncPath(format!("{}/{}", self.0, name)))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// True if `prefix` names this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &SyncPath) -> bool {
        let mut ours = self.components();
        prefix.components().all(|c| ours.next() == Some(c))
    }

    /// Resolves this path below a native directory.
    pub fn to_native(&self, root: &Path) -> PathBuf {
        let mut native = root.to_path_buf();
        for component in self.components() {
            native.push(component);
        }
        native
    }
}

fn check_component(path: &str, component: &str) -> Result<(), SyncError> {
    let reason = if component == "." || component == ".." {
        "relative components are not allowed"
    } else if component.contains(|c: char| c == '\t' || c == '\n' || c == '\r') {
        "contains a tab or line break"
    } else {
        return Ok(());
    };
    Err(SyncError::InvalidPath {
        path: path.to_owned(),
        reason,
    })
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for SyncPath {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncPath::new(s)
    }
}

impl AsRef<str> for SyncPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
