//! Pull-based decompression of downloaded archives.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use bzip2::read::BzDecoder;
use serde::Serialize;
use thiserror::Error;
use xz2::read::XzDecoder;

#[derive(Debug, Error)]
pub enum DecompressError {
  #[error("unsupported compression {0:?}")]
  Unsupported(String),

  #[error("compressed stream did not reach a valid end: {0}")]
  Unfinished(#[source] io::Error),

  #[error("failed to drain the remaining download: {0}")]
  Drain(#[source] io::Error),
}

/// Codecs a binary cache may announce in its metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
  #[default]
  None,
  Bzip2,
  Xz,
}

impl Compression {
  pub fn as_str(&self) -> &'static str {
    match self {
      Compression::None => "none",
      Compression::Bzip2 => "bzip2",
      Compression::Xz => "xz",
    }
  }
}

impl fmt::Display for Compression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Compression {
  type Err = DecompressError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "none" => Ok(Compression::None),
      "bzip2" => Ok(Compression::Bzip2),
      "xz" => Ok(Compression::Xz),
      other => Err(DecompressError::Unsupported(other.to_string())),
    }
  }
}

enum Decoder<R: Read> {
  Identity(R),
  Bzip2(BzDecoder<R>),
  Xz(XzDecoder<R>),
}

/// Decompressed view over a raw byte source.
///
/// Reads may return fewer bytes than asked for. A read returns 0 only after
/// the compressed input is exhausted and the decoder has been drained; a
/// compressed stream that stops early fails with [`io::ErrorKind::UnexpectedEof`].
pub struct DecompressReader<R: Read> {
  decoder: Decoder<R>,
}

impl<R: Read> DecompressReader<R> {
  pub fn new(raw: R, compression: Compression) -> Self {
    let decoder = match compression {
      Compression::None => Decoder::Identity(raw),
      Compression::Bzip2 => Decoder::Bzip2(BzDecoder::new(raw)),
      Compression::Xz => Decoder::Xz(XzDecoder::new(raw)),
    };
    Self { decoder }
  }

  /// Confirms the decoder reached the end of its stream and consumes whatever
  /// the raw source still holds. Decoded bytes nobody read are discarded.
  pub fn finish(self) -> Result<R, DecompressError> {
    let mut raw = match self.decoder {
      Decoder::Identity(raw) => raw,
      Decoder::Bzip2(mut decoder) => {
        io::copy(&mut decoder, &mut io::sink()).map_err(DecompressError::Unfinished)?;
        decoder.into_inner()
      }
      Decoder::Xz(mut decoder) => {
        io::copy(&mut decoder, &mut io::sink()).map_err(DecompressError::Unfinished)?;
        decoder.into_inner()
      }
    };

    io::copy(&mut raw, &mut io::sink()).map_err(DecompressError::Drain)?;
    Ok(raw)
  }
}

impl<R: Read> Read for DecompressReader<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    match &mut self.decoder {
      Decoder::Identity(raw) => raw.read(buf),
      Decoder::Bzip2(decoder) => decoder.read(buf),
      Decoder::Xz(decoder) => decoder.read(buf),
    }
  }
}
