//! Test utilities for flinger-lib.
//!
//! Provides an in-memory binary cache and helpers for building store objects
//! without touching the network.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use url::Url;

use crate::archive::{Node, encode};
use crate::cache::BinaryCache;
use crate::decompress::Compression;
use crate::store::Basename;
use crate::transport::{Fetch, TransportError};

pub const CACHE_BASE: &str = "https://cache.example.org";

/// A basename whose hash prefix is `c` repeated 32 times.
pub fn basename(c: char, label: &str) -> Basename {
  Basename::new(format!("{}-{}", c.to_string().repeat(32), label)).unwrap()
}

pub fn bzip2_compress(data: &[u8]) -> Vec<u8> {
  let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
  encoder.write_all(data).unwrap();
  encoder.finish().unwrap()
}

pub fn xz_compress(data: &[u8]) -> Vec<u8> {
  let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
  encoder.write_all(data).unwrap();
  encoder.finish().unwrap()
}

pub fn compress(data: &[u8], compression: Compression) -> Vec<u8> {
  match compression {
    Compression::None => data.to_vec(),
    Compression::Bzip2 => bzip2_compress(data),
    Compression::Xz => xz_compress(data),
  }
}

/// An in-memory binary cache that records every request.
///
/// Unknown URLs answer like a 404.
#[derive(Default)]
pub struct FakeCache {
  documents: HashMap<String, Vec<u8>>,
  requests: Vec<String>,
}

impl FakeCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cache(&self) -> BinaryCache {
    BinaryCache::new(CACHE_BASE).unwrap()
  }

  pub fn metadata_url(&self, object: &Basename) -> String {
    format!("{CACHE_BASE}/{}.narinfo", object.hash_prefix())
  }

  pub fn serve(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
    self.documents.insert(url.into(), body.into());
  }

  pub fn serve_metadata(&mut self, object: &Basename, document: &str) {
    self.serve(self.metadata_url(object), document);
  }

  /// Serves `tree` as an uncompressed archive for `object`.
  pub fn publish(&mut self, object: &Basename, references: &[&Basename], tree: &Node) {
    self.publish_with(object, references, tree, Compression::None);
  }

  pub fn publish_with(&mut self, object: &Basename, references: &[&Basename], tree: &Node, compression: Compression) {
    let archive_path = format!("nar/{}.nar", object.hash_prefix());
    let mut document = format!("StorePath: /nix/store/{object}\nURL: {archive_path}\nCompression: {compression}\n");
    if !references.is_empty() {
      let refs: Vec<&str> = references.iter().map(|r| r.as_str()).collect();
      document.push_str(&format!("References: {}\n", refs.join(" ")));
    }

    self.serve_metadata(object, &document);
    self.serve(format!("{CACHE_BASE}/{archive_path}"), compress(&encode(tree), compression));
  }

  pub fn requests(&self) -> Vec<String> {
    self.requests.clone()
  }

  pub fn request_count(&self, url: &str) -> usize {
    self.requests.iter().filter(|r| *r == url).count()
  }
}

impl Fetch for FakeCache {
  fn get(&mut self, url: &Url) -> Result<Box<dyn Read>, TransportError> {
    self.requests.push(url.to_string());
    match self.documents.get(url.as_str()) {
      Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
      None => Err(TransportError::Status {
        url: url.to_string(),
        status: 404,
      }),
    }
  }
}
