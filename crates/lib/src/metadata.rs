//! Metadata documents describing store objects in a binary cache.
//!
//! A document is a strict header block:
//!
//! ```text
//! StorePath: /nix/store/0c5kx5zw1m5ysdh2bm1x06ykdcrjsaxn-hello-2.12.1
//! URL: nar/1w1fff338fvdw53sqgamddn1b2xgds473pv6y13gizdbqjv4i5p3.nar.xz
//! Compression: xz
//! References: 0c5kx5zw1m5ysdh2bm1x06ykdcrjsaxn-hello-2.12.1
//! References: 3n58xw4373jp0ljirf06d8077j15pc4j-glibc-2.37-8
//! ```
//!
//! Field names are case-insensitive and may repeat; every occurrence is kept.

use std::io::{self, Read};

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::cache::BinaryCache;
use crate::decompress::Compression;
use crate::store::{Basename, StoreError};
use crate::transport::{Fetch, TransportError};

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error("failed to read metadata: {0}")]
  Read(#[source] io::Error),

  #[error("metadata is not valid UTF-8")]
  NotUtf8,

  #[error("malformed header on line {line}: {reason}")]
  Malformed { line: usize, reason: &'static str },

  #[error("missing required field {0:?}")]
  MissingField(&'static str),

  #[error("invalid URL {url:?}: {source}")]
  InvalidUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("unsupported compression {0:?}")]
  UnsupportedCompression(String),

  #[error("invalid reference: {0}")]
  InvalidReference(#[source] StoreError),
}

impl MetadataError {
  /// Whether the document itself was at fault, as opposed to fetching it.
  pub fn is_format(&self) -> bool {
    !matches!(self, MetadataError::Transport(_) | MetadataError::Read(_))
  }
}

/// Ordered, multi-valued header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
  pub fn parse(text: &str) -> Result<Self, MetadataError> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for (index, raw) in text.split('\n').enumerate() {
      let line = raw.strip_suffix('\r').unwrap_or(raw);
      let number = index + 1;

      if line.is_empty() {
        break;
      }

      if line.starts_with([' ', '\t']) {
        let Some((_, value)) = fields.last_mut() else {
          return Err(MetadataError::Malformed {
            line: number,
            reason: "continuation before any field",
          });
        };
        let folded = line.trim();
        if !folded.is_empty() {
          if !value.is_empty() {
            value.push(' ');
          }
          value.push_str(folded);
        }
        continue;
      }

      let Some((name, value)) = line.split_once(':') else {
        return Err(MetadataError::Malformed {
          line: number,
          reason: "missing ':' separator",
        });
      };
      if name.is_empty() {
        return Err(MetadataError::Malformed {
          line: number,
          reason: "empty field name",
        });
      }
      if !name.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(MetadataError::Malformed {
          line: number,
          reason: "field name must be printable ASCII without spaces",
        });
      }

      fields.push((name.to_string(), value.trim().to_string()));
    }

    Ok(Self(fields))
  }

  /// First value of `name`, compared case-insensitively.
  pub fn get(&self, name: &str) -> Option<&str> {
    self.get_all(name).next()
  }

  /// Every value of `name` in document order.
  pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
    self
      .0
      .iter()
      .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }
}

/// Everything needed to download and unpack one store object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
  pub download_url: Url,
  pub compression: Compression,
  pub references: Vec<Basename>,
  pub fields: Fields,
}

impl Metadata {
  pub fn parse(bytes: &[u8], cache: &BinaryCache) -> Result<Self, MetadataError> {
    let text = std::str::from_utf8(bytes).map_err(|_| MetadataError::NotUtf8)?;
    let fields = Fields::parse(text)?;

    let url = fields.get("URL").ok_or(MetadataError::MissingField("URL"))?;
    let download_url = cache.resolve(url).map_err(|source| MetadataError::InvalidUrl {
      url: url.to_string(),
      source,
    })?;

    let compression = match fields.get("Compression") {
      Some(name) => name
        .parse()
        .map_err(|_| MetadataError::UnsupportedCompression(name.to_string()))?,
      None => Compression::None,
    };

    let references = fields
      .get_all("References")
      .flat_map(str::split_whitespace)
      .map(|r| Basename::new(r).map_err(MetadataError::InvalidReference))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      download_url,
      compression,
      references,
      fields,
    })
  }
}

/// Fetches and parses the metadata of the object with `hash_prefix`.
pub fn fetch_metadata<F: Fetch>(fetcher: &mut F, cache: &BinaryCache, hash_prefix: &str) -> Result<Metadata, MetadataError> {
  let url = cache
    .metadata_url(hash_prefix)
    .map_err(|source| MetadataError::InvalidUrl {
      url: hash_prefix.to_string(),
      source,
    })?;
  debug!(url = %url, "fetching metadata");

  let mut body = fetcher.get(&url)?;
  let mut bytes = Vec::new();
  body.read_to_end(&mut bytes).map_err(MetadataError::Read)?;

  Metadata::parse(&bytes, cache)
}
