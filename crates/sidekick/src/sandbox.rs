//! File access confined to one directory tree.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Errors raised by [`Sandbox`].
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The path resolves outside the root, lexically or through a symlink.
    #[error("path escapes the sandbox root: {0}")]
    AccessDenied(String),
    /// Nothing exists at the path.
    #[error("no such file: {0}")]
    NotFound(String),
    /// The file is not valid UTF-8.
    #[error("{path}: {source}")]
    Decode {
        /// The path as requested.
        path: String,
        /// The decoding failure.
        #[source]
        source: std::string::FromUtf8Error,
    },
    /// Any other I/O failure, e.g. reading a directory.
    #[error("{path}: {source}")]
    Io {
        /// The path as requested.
        path: String,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },
}

/// A directory tree that tools may read from.
///
/// Paths are always relative to the root. A path is rejected before the
/// filesystem is touched when it lexically leaves the root, and again after
/// symlinks are resolved.
#[derive(Clone, Debug)]
pub struct Sandbox {
    root: Arc<Path>,
}

impl Sandbox {
    /// Creates a sandbox rooted at `root`, which must exist.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root: root.into() })
    }

    /// Returns the canonical root.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `relative_path` to a canonical path inside the root.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, SandboxError> {
        let joined = normalize(&self.root.join(relative_path));
        if !joined.starts_with(&self.root) {
            debug!("rejected lexical escape: {relative_path}");
            return Err(SandboxError::AccessDenied(relative_path.to_owned()));
        }

        let canonical = joined.canonicalize().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                SandboxError::NotFound(relative_path.to_owned())
            } else {
                SandboxError::Io {
                    path: relative_path.to_owned(),
                    source: err,
                }
            }
        })?;
        if !canonical.starts_with(&self.root) {
            debug!("rejected symlink escape: {relative_path}");
            return Err(SandboxError::AccessDenied(relative_path.to_owned()));
        }
        Ok(canonical)
    }

    /// Reads a UTF-8 text file inside the root.
    pub fn read_to_string(
        &self,
        relative_path: &str,
    ) -> Result<String, SandboxError> {
        let path = self.resolve(relative_path)?;
        let bytes = fs::read(&path).map_err(|err| SandboxError::Io {
            path: relative_path.to_owned(),
            source: err,
        })?;
        String::from_utf8(bytes).map_err(|err| SandboxError::Decode {
            path: relative_path.to_owned(),
            source: err,
        })
    }
}

/// Collapses `.` and `..` without consulting the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
