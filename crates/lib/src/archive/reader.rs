//! Wire-level reads: integers, padded byte strings and literals.

use std::io::{self, Read, Write};

use super::{ArchiveError, MAX_STRING_LEN};

const CHUNK: usize = 64 * 1024;

fn padding(len: u64) -> usize {
  ((8 - (len % 8)) % 8) as usize
}

fn read_error(e: io::Error) -> ArchiveError {
  if e.kind() == io::ErrorKind::UnexpectedEof {
    ArchiveError::Truncated
  } else {
    ArchiveError::Read(e)
  }
}

/// Reads archive primitives where every read is "exactly N bytes or fail".
pub struct ArchiveReader<R> {
  inner: R,
}

impl<R: Read> ArchiveReader<R> {
  pub fn new(inner: R) -> Self {
    Self { inner }
  }

  pub fn into_inner(self) -> R {
    self.inner
  }

  fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ArchiveError> {
    self.inner.read_exact(buf).map_err(read_error)
  }

  pub fn read_u64(&mut self) -> Result<u64, ArchiveError> {
    let mut buf = [0u8; 8];
    self.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
  }

  fn skip_padding(&mut self, len: u64) -> Result<(), ArchiveError> {
    let mut pad = [0u8; 8];
    let pad = &mut pad[..padding(len)];
    self.read_exact(pad)?;
    if pad.iter().any(|&b| b != 0) {
      return Err(ArchiveError::BadPadding);
    }
    Ok(())
  }

  /// Reads a length-prefixed byte string of at most [`MAX_STRING_LEN`] bytes.
  pub fn read_bytes(&mut self) -> Result<Vec<u8>, ArchiveError> {
    let len = self.read_u64()?;
    if len > MAX_STRING_LEN {
      return Err(ArchiveError::TooLong(len));
    }
    let mut buf = vec![0u8; len as usize];
    self.read_exact(&mut buf)?;
    self.skip_padding(len)?;
    Ok(buf)
  }

  /// Reads a byte string and fails unless it equals `expected`.
  pub fn expect(&mut self, expected: &[u8]) -> Result<(), ArchiveError> {
    let found = self.read_bytes()?;
    if found != expected {
      return Err(ArchiveError::unexpected(expected, &found));
    }
    Ok(())
  }

  /// Streams a length-prefixed blob of any size into `out` in bounded chunks.
  ///
  /// Write failures are reported by `on_write` so the caller can name the
  /// destination. Returns the number of bytes copied.
  pub fn copy_blob<W, E>(&mut self, out: &mut W, on_write: E) -> Result<u64, ArchiveError>
  where
    W: Write,
    E: Fn(io::Error) -> ArchiveError,
  {
    let len = self.read_u64()?;
    let mut remaining = len;
    let mut buf = vec![0u8; CHUNK.min(len as usize)];

    while remaining > 0 {
      let want = buf.len().min(remaining as usize);
      let n = match self.inner.read(&mut buf[..want]) {
        Ok(0) => return Err(ArchiveError::Truncated),
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
        Err(e) => return Err(read_error(e)),
      };
      out.write_all(&buf[..n]).map_err(&on_write)?;
      remaining -= n as u64;
    }

    self.skip_padding(len)?;
    Ok(len)
  }
}
