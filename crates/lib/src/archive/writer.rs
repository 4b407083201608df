//! Encoding a [`Node`] tree as an archive stream.

use std::io::{self, Write};

use super::Node;
use crate::consts::ARCHIVE_MAGIC;

const ZEROS: [u8; 8] = [0; 8];

pub struct ArchiveWriter<W> {
  inner: W,
}

impl<W: Write> ArchiveWriter<W> {
  pub fn new(inner: W) -> Self {
    Self { inner }
  }

  pub fn into_inner(self) -> W {
    self.inner
  }

  /// Writes `bytes` as a length-prefixed, zero-padded string.
  pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
    let len = bytes.len() as u64;
    self.inner.write_all(&len.to_le_bytes())?;
    self.inner.write_all(bytes)?;
    let pad = ((8 - (len % 8)) % 8) as usize;
    self.inner.write_all(&ZEROS[..pad])
  }

  /// Writes the magic header followed by `node`.
  pub fn write_archive(&mut self, node: &Node) -> io::Result<()> {
    self.write_bytes(ARCHIVE_MAGIC)?;
    self.write_node(node)
  }

  pub fn write_node(&mut self, node: &Node) -> io::Result<()> {
    self.write_bytes(b"(")?;
    self.write_bytes(b"type")?;
    match node {
      Node::File { executable, contents } => {
        self.write_bytes(b"regular")?;
        if *executable {
          self.write_bytes(b"executable")?;
          self.write_bytes(b"")?;
        }
        self.write_bytes(b"contents")?;
        self.write_bytes(contents)?;
      }
      Node::Symlink { target } => {
        self.write_bytes(b"symlink")?;
        self.write_bytes(b"target")?;
        self.write_bytes(target)?;
      }
      Node::Directory { entries } => {
        self.write_bytes(b"directory")?;
        for (name, child) in entries {
          self.write_bytes(b"entry")?;
          self.write_bytes(b"(")?;
          self.write_bytes(b"name")?;
          self.write_bytes(name.as_bytes())?;
          self.write_bytes(b"node")?;
          self.write_node(child)?;
          self.write_bytes(b")")?;
        }
      }
    }
    self.write_bytes(b")")
  }
}

/// Serializes `node` as a complete archive.
pub fn encode(node: &Node) -> Vec<u8> {
  let mut writer = ArchiveWriter::new(Vec::new());
  writer.write_archive(node).expect("writing to a Vec cannot fail");
  writer.into_inner()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn written(bytes: &[u8]) -> Vec<u8> {
    let mut writer = ArchiveWriter::new(Vec::new());
    writer.write_bytes(bytes).unwrap();
    writer.into_inner()
  }

  #[test]
  fn five_bytes_get_three_padding_bytes() {
    let out = written(b"hello");
    assert_eq!(out.len(), 8 + 5 + 3);
    assert_eq!(&out[..8], &5u64.to_le_bytes());
    assert_eq!(&out[8..13], b"hello");
    assert_eq!(&out[13..], &[0, 0, 0]);
  }

  #[test]
  fn eight_bytes_get_no_padding() {
    let out = written(b"12345678");
    assert_eq!(out.len(), 16);
    assert_eq!(&out[8..], b"12345678");
  }

  #[test]
  fn empty_string_is_just_the_length() {
    assert_eq!(written(b""), 0u64.to_le_bytes().to_vec());
  }

  #[test]
  fn encodes_single_file_archive() {
    let out = encode(&Node::file("hi"));

    let mut expected = ArchiveWriter::new(Vec::new());
    for s in [
      &b"nix-archive-1"[..],
      b"(",
      b"type",
      b"regular",
      b"contents",
      b"hi",
      b")",
    ] {
      expected.write_bytes(s).unwrap();
    }
    assert_eq!(out, expected.into_inner());
  }

  #[test]
  fn encodes_executable_entry_in_directory() {
    let out = encode(&Node::directory([("run", Node::executable("x"))]));

    let mut expected = ArchiveWriter::new(Vec::new());
    for s in [
      &b"nix-archive-1"[..],
      b"(",
      b"type",
      b"directory",
      b"entry",
      b"(",
      b"name",
      b"run",
      b"node",
      b"(",
      b"type",
      b"regular",
      b"executable",
      b"",
      b"contents",
      b"x",
      b")",
      b")",
      b")",
    ] {
      expected.write_bytes(s).unwrap();
    }
    assert_eq!(out, expected.into_inner());
  }
}
