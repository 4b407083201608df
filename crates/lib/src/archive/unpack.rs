//! Decoding an archive stream onto the filesystem.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::Path;

use tracing::trace;

use super::{ArchiveError, ArchiveReader, MAX_DEPTH};
use crate::consts::ARCHIVE_MAGIC;

/// Unpacks the archive read from `source` so that its root lands at `dst`.
///
/// `dst` must not exist yet. On failure whatever was written before the
/// offending token stays on disk; callers unpack into a staging area.
pub fn unpack<R: Read>(dst: &Path, source: R) -> Result<(), ArchiveError> {
  let mut reader = ArchiveReader::new(source);
  reader.expect(ARCHIVE_MAGIC)?;
  unpack_node(&mut reader, dst, 0)
}

enum NodeType {
  Regular,
  Symlink,
  Directory,
}

fn unpack_node<R: Read>(reader: &mut ArchiveReader<R>, dst: &Path, depth: usize) -> Result<(), ArchiveError> {
  if depth > MAX_DEPTH {
    return Err(ArchiveError::TooDeep);
  }

  reader.expect(b"(")?;
  reader.expect(b"type")?;

  let kind = reader.read_bytes()?;
  let kind = match kind.as_slice() {
    b"regular" => NodeType::Regular,
    b"symlink" => NodeType::Symlink,
    b"directory" => NodeType::Directory,
    _ => return Err(ArchiveError::UnknownType(String::from_utf8_lossy(&kind).into_owned())),
  };

  match kind {
    NodeType::Regular => unpack_regular(reader, dst),
    NodeType::Symlink => unpack_symlink(reader, dst),
    NodeType::Directory => unpack_directory(reader, dst, depth),
  }
}

fn misplaced(key: Vec<u8>, context: &'static str) -> ArchiveError {
  ArchiveError::UnknownKey {
    key: String::from_utf8_lossy(&key).into_owned(),
    context,
  }
}

fn create_file(dst: &Path, executable: bool) -> Result<File, ArchiveError> {
  let mut options = OpenOptions::new();
  options.write(true).create_new(true);
  #[cfg(unix)]
  {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(if executable { 0o777 } else { 0o666 });
  }
  #[cfg(not(unix))]
  let _ = executable;

  options.open(dst).map_err(|e| ArchiveError::write(dst, e))
}

fn unpack_regular<R: Read>(reader: &mut ArchiveReader<R>, dst: &Path) -> Result<(), ArchiveError> {
  let mut executable = false;
  let mut written = false;

  loop {
    let key = reader.read_bytes()?;
    match key.as_slice() {
      b")" => break,
      b"executable" if !executable && !written => {
        reader.expect(b"")?;
        executable = true;
      }
      b"contents" if !written => {
        let mut file = create_file(dst, executable)?;
        let len = reader.copy_blob(&mut file, |e| ArchiveError::write(dst, e))?;
        trace!(path = %dst.display(), len, executable, "wrote file");
        written = true;
      }
      _ => return Err(misplaced(key, "regular file")),
    }
  }

  if !written {
    create_file(dst, executable)?;
  }
  Ok(())
}

fn unpack_symlink<R: Read>(reader: &mut ArchiveReader<R>, dst: &Path) -> Result<(), ArchiveError> {
  let key = reader.read_bytes()?;
  match key.as_slice() {
    b"target" => {}
    b")" => return Err(ArchiveError::MissingTarget),
    _ => return Err(misplaced(key, "symlink")),
  }

  let target = reader.read_bytes()?;
  create_symlink(&target, dst)?;
  trace!(path = %dst.display(), "created symlink");

  reader.expect(b")")
}

#[cfg(unix)]
fn create_symlink(target: &[u8], dst: &Path) -> Result<(), ArchiveError> {
  use std::ffi::OsStr;
  use std::os::unix::ffi::OsStrExt;

  std::os::unix::fs::symlink(OsStr::from_bytes(target), dst).map_err(|e| ArchiveError::write(dst, e))
}

#[cfg(windows)]
fn create_symlink(target: &[u8], dst: &Path) -> Result<(), ArchiveError> {
  let target = std::str::from_utf8(target).map_err(|_| ArchiveError::InvalidName(String::from_utf8_lossy(target).into_owned()))?;
  std::os::windows::fs::symlink_file(target, dst).map_err(|e| ArchiveError::write(dst, e))
}

fn unpack_directory<R: Read>(reader: &mut ArchiveReader<R>, dst: &Path, depth: usize) -> Result<(), ArchiveError> {
  fs::create_dir(dst).map_err(|e| ArchiveError::write(dst, e))?;
  let mut seen = HashSet::new();

  loop {
    let key = reader.read_bytes()?;
    match key.as_slice() {
      b")" => return Ok(()),
      b"entry" => unpack_entry(reader, dst, depth, &mut seen)?,
      _ => return Err(misplaced(key, "directory")),
    }
  }
}

fn unpack_entry<R: Read>(
  reader: &mut ArchiveReader<R>,
  dir: &Path,
  depth: usize,
  seen: &mut HashSet<String>,
) -> Result<(), ArchiveError> {
  reader.expect(b"(")?;
  reader.expect(b"name")?;
  let name = entry_name(reader.read_bytes()?)?;
  if !seen.insert(name.clone()) {
    return Err(ArchiveError::DuplicateEntry(name));
  }
  reader.expect(b"node")?;
  unpack_node(reader, &dir.join(name), depth + 1)?;
  reader.expect(b")")
}

/// Checks that a raw entry name is a single plain path component.
fn entry_name(raw: Vec<u8>) -> Result<String, ArchiveError> {
  let name = String::from_utf8(raw).map_err(|e| ArchiveError::InvalidName(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;
  if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
    return Err(ArchiveError::InvalidName(name));
  }
  Ok(name)
}
