//! The local content-addressed store.
//!
//! # Layout
//!
//! ```text
//! <store_prefix>/
//! ├── <hash>-<name>/          # Installed objects (immutable once published)
//! └── install-XXXXXX/         # Staging area of a running install
//! ```
//!
//! An object counts as installed as soon as anything exists at its path. The
//! contents are never re-verified.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::consts::HASH_PREFIX_LEN;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("invalid basename {basename:?}: {reason}")]
  InvalidBasename { basename: String, reason: &'static str },

  #[error("failed to probe store path {path}: {source}")]
  Probe {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A store-relative object name such as `0c5kx5zw1m5ysdh2bm1x06ykdcrjsaxn-hello-2.12.1`.
///
/// The first [`HASH_PREFIX_LEN`] characters form the hash prefix, which is how
/// the binary cache addresses the object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Basename(String);

impl Basename {
  pub fn new(basename: impl Into<String>) -> Result<Self, StoreError> {
    let basename = basename.into();
    let invalid = |reason| StoreError::InvalidBasename {
      basename: basename.clone(),
      reason,
    };

    if basename.len() < HASH_PREFIX_LEN {
      return Err(invalid("shorter than the hash prefix"));
    }
    if !basename.as_bytes()[..HASH_PREFIX_LEN]
      .iter()
      .all(u8::is_ascii_alphanumeric)
    {
      return Err(invalid("hash prefix must be ASCII alphanumeric"));
    }
    if basename.contains(['/', '\0']) {
      return Err(invalid("contains a path separator or NUL"));
    }

    Ok(Self(basename))
  }

  pub fn hash_prefix(&self) -> &str {
    &self.0[..HASH_PREFIX_LEN]
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Basename {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for Basename {
  type Err = StoreError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(s)
  }
}

impl AsRef<str> for Basename {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

#[derive(Debug, Clone)]
pub struct Store {
  prefix: PathBuf,
}

impl Store {
  pub fn new(prefix: impl Into<PathBuf>) -> Self {
    Self { prefix: prefix.into() }
  }

  /// Creates the prefix if needed and switches to its canonical form, so that
  /// symlinks pointing into the store compare reliably.
  pub fn open(prefix: impl Into<PathBuf>) -> io::Result<Self> {
    let prefix = prefix.into();
    std::fs::create_dir_all(&prefix)?;
    let prefix = dunce::canonicalize(&prefix)?;
    Ok(Self { prefix })
  }

  pub fn prefix(&self) -> &Path {
    &self.prefix
  }

  pub fn path(&self, basename: &Basename) -> PathBuf {
    self.prefix.join(basename.as_str())
  }

  /// Whether anything (even a dangling symlink) exists at the object's path.
  pub fn contains(&self, basename: &Basename) -> Result<bool, StoreError> {
    let path = self.path(basename);
    match std::fs::symlink_metadata(&path) {
      Ok(_) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(source) => Err(StoreError::Probe { path, source }),
    }
  }

  /// Whether `path` lies inside this store, compared component-wise.
  ///
  /// Paths with `..` components never count, since they can climb back out.
  pub fn owns(&self, path: &Path) -> bool {
    path.starts_with(&self.prefix) && !path.components().any(|c| c == Component::ParentDir)
  }
}
