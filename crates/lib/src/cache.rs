//! Addressing of a remote binary cache.

use url::Url;

use crate::consts::METADATA_EXT;

/// A binary cache rooted at a base URL such as `https://cache.nixos.org`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCache {
  /// Base URL with a trailing slash so relative references land beneath it.
  root: Url,
}

impl BinaryCache {
  pub fn new(base: &str) -> Result<Self, url::ParseError> {
    let trimmed = base.trim_end_matches('/');
    let root = Url::parse(&format!("{trimmed}/"))?;
    Ok(Self { root })
  }

  /// The base URL as configured, without the trailing slash.
  pub fn base(&self) -> &str {
    self.root.as_str().trim_end_matches('/')
  }

  /// `{base}/{hash_prefix}.narinfo`
  pub fn metadata_url(&self, hash_prefix: &str) -> Result<Url, url::ParseError> {
    self.root.join(&format!("{hash_prefix}.{METADATA_EXT}"))
  }

  /// Resolves a reference found in a metadata document against the cache root.
  pub fn resolve(&self, reference: &str) -> Result<Url, url::ParseError> {
    self.root.join(reference)
  }
}
