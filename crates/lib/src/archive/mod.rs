//! The store archive format.
//!
//! An archive serializes one filesystem tree (regular files with an optional
//! executable bit, symlinks and directories) as a flat stream of 64-bit
//! little-endian lengths and zero-padded byte strings:
//!
//! ```text
//! archive   = "nix-archive-1" node
//! node      = "(" "type" "regular" ["executable" ""] "contents" bytes ")"
//!           | "(" "type" "symlink" "target" bytes ")"
//!           | "(" "type" "directory" entry* ")"
//! entry     = "entry" "(" "name" bytes "node" node ")"
//! ```
//!
//! [`unpack`] decodes a stream directly onto disk without buffering file
//! contents. [`ArchiveWriter`] produces the same format from a [`Node`] tree.

mod reader;
mod unpack;
mod writer;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use reader::ArchiveReader;
pub use unpack::unpack;
pub use writer::{ArchiveWriter, encode};

/// Longest byte string accepted outside of file contents.
pub const MAX_STRING_LEN: u64 = 1 << 16;

/// Deepest directory nesting accepted while unpacking.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("unexpected {found:?}, expected {expected:?}")]
  Unexpected { expected: String, found: String },

  #[error("unrecognized key {key:?} in {context}")]
  UnknownKey { key: String, context: &'static str },

  #[error("unrecognized node type {0:?}")]
  UnknownType(String),

  #[error("invalid entry name {0:?}")]
  InvalidName(String),

  #[error("duplicate entry name {0:?}")]
  DuplicateEntry(String),

  #[error("string of {0} bytes exceeds the limit")]
  TooLong(u64),

  #[error("nonzero padding byte")]
  BadPadding,

  #[error("directories nested deeper than {MAX_DEPTH}")]
  TooDeep,

  #[error("symlink node without a target")]
  MissingTarget,

  #[error("archive ended prematurely")]
  Truncated,

  #[error("failed to read archive: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl ArchiveError {
  /// Whether the stream itself is malformed, as opposed to an I/O failure.
  pub fn is_format(&self) -> bool {
    !matches!(self, ArchiveError::Read(_) | ArchiveError::Write { .. })
  }

  pub(crate) fn unexpected(expected: &[u8], found: &[u8]) -> Self {
    ArchiveError::Unexpected {
      expected: String::from_utf8_lossy(expected).into_owned(),
      found: String::from_utf8_lossy(found).into_owned(),
    }
  }

  pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
    ArchiveError::Write {
      path: path.into(),
      source,
    }
  }
}

/// In-memory form of an archived tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
  File { executable: bool, contents: Vec<u8> },
  Symlink { target: Vec<u8> },
  Directory { entries: Vec<(String, Node)> },
}

impl Node {
  pub fn file(contents: impl Into<Vec<u8>>) -> Self {
    Node::File {
      executable: false,
      contents: contents.into(),
    }
  }

  pub fn executable(contents: impl Into<Vec<u8>>) -> Self {
    Node::File {
      executable: true,
      contents: contents.into(),
    }
  }

  pub fn symlink(target: impl Into<Vec<u8>>) -> Self {
    Node::Symlink { target: target.into() }
  }

  pub fn directory<I, S>(entries: I) -> Self
  where
    I: IntoIterator<Item = (S, Node)>,
    S: Into<String>,
  {
    Node::Directory {
      entries: entries.into_iter().map(|(name, node)| (name.into(), node)).collect(),
    }
  }
}
