//! Installing store objects and their closures.
//!
//! Objects are unpacked into a staging directory created inside the store
//! prefix and published with a single `rename`, so the store never holds a
//! partially written object under its final name.

mod link;

pub use link::{LinkOutcome, LinkReport, expose_bins, link_one};

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveError};
use crate::cache::BinaryCache;
use crate::closure::{ClosureError, resolve_closure};
use crate::config::Config;
use crate::consts::STAGING_PREFIX;
use crate::context::RunContext;
use crate::decompress::{DecompressError, DecompressReader};
use crate::metadata::Metadata;
use crate::store::{Basename, Store, StoreError};
use crate::transport::{Fetch, TransportError};

/// Coarse classification of install failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
  /// The network or the remote cache failed us.
  Transport,
  /// Data from the cache was malformed.
  Format,
  /// The local filesystem refused an operation.
  Filesystem,
}

impl fmt::Display for ErrorClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      ErrorClass::Transport => "transport",
      ErrorClass::Format => "format",
      ErrorClass::Filesystem => "filesystem",
    })
  }
}

#[derive(Debug, Error)]
pub enum InstallError {
  #[error("failed to prepare {path}: {source}")]
  Prepare {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to resolve the closure of {basename}: {source}")]
  Resolve {
    basename: Basename,
    #[source]
    source: ClosureError,
  },

  #[error("failed to download {basename}: {source}")]
  Download {
    basename: Basename,
    #[source]
    source: TransportError,
  },

  #[error("failed to unpack {basename}: {source}")]
  Unpack {
    basename: Basename,
    #[source]
    source: ArchiveError,
  },

  #[error("failed to decompress {basename}: {source}")]
  Decompress {
    basename: Basename,
    #[source]
    source: DecompressError,
  },

  #[error("failed to publish {basename} to {path}: {source}")]
  Publish {
    basename: Basename,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to link {link}: {source}")]
  Link {
    link: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to inspect {path}: {source}")]
  Probe {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl InstallError {
  pub fn class(&self) -> ErrorClass {
    match self {
      InstallError::Resolve { source, .. } => match source {
        ClosureError::Metadata { source, .. } if source.is_format() => ErrorClass::Format,
        ClosureError::Metadata { .. } => ErrorClass::Transport,
        ClosureError::Store(StoreError::InvalidBasename { .. }) => ErrorClass::Format,
        ClosureError::Store(StoreError::Probe { .. }) => ErrorClass::Filesystem,
      },
      InstallError::Download { .. } => ErrorClass::Transport,
      InstallError::Unpack { source, .. } => match source {
        ArchiveError::Write { .. } => ErrorClass::Filesystem,
        ArchiveError::Read(e) if e.kind() == io::ErrorKind::InvalidData => ErrorClass::Format,
        ArchiveError::Read(_) => ErrorClass::Transport,
        _ => ErrorClass::Format,
      },
      InstallError::Decompress { source, .. } => match source {
        DecompressError::Drain(_) => ErrorClass::Transport,
        DecompressError::Unsupported(_) | DecompressError::Unfinished(_) => ErrorClass::Format,
      },
      InstallError::Prepare { .. }
      | InstallError::Publish { .. }
      | InstallError::Link { .. }
      | InstallError::Probe { .. } => ErrorClass::Filesystem,
    }
  }
}

/// Outcome of one install run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct InstallReport {
  /// Objects downloaded and published, in install order.
  pub installed: Vec<Basename>,
  pub links: Vec<LinkReport>,
}

impl InstallReport {
  pub fn conflicts(&self) -> impl Iterator<Item = &LinkReport> {
    self.links.iter().filter(|l| l.outcome.is_conflict())
  }
}

/// Drives one run. The run context, and with it every cached connection,
/// lives exactly as long as the installer.
pub struct Installer<F: Fetch> {
  ctx: RunContext<F>,
  store: Store,
  cache: BinaryCache,
  bin_dir: PathBuf,
}

impl<F: Fetch> Installer<F> {
  pub fn new(fetcher: F, store: Store, cache: BinaryCache, bin_dir: impl Into<PathBuf>) -> Self {
    Self {
      ctx: RunContext::new(fetcher),
      store,
      cache,
      bin_dir: bin_dir.into(),
    }
  }

  pub fn from_config(fetcher: F, config: &Config) -> Self {
    Self::new(
      fetcher,
      Store::new(&config.store_prefix),
      config.cache.clone(),
      &config.bin_dir,
    )
  }

  pub fn store(&self) -> &Store {
    &self.store
  }

  /// Installs the closure of every basename and exposes the binaries of the
  /// basenames themselves.
  ///
  /// The first error aborts the run. Objects published before it stay in the
  /// store, so a rerun picks up where this one stopped.
  pub fn install(mut self, basenames: &[Basename]) -> Result<InstallReport, InstallError> {
    self.store = Store::open(self.store.prefix()).map_err(|source| InstallError::Prepare {
      path: self.store.prefix().to_path_buf(),
      source,
    })?;
    fs::create_dir_all(&self.bin_dir).map_err(|source| InstallError::Prepare {
      path: self.bin_dir.clone(),
      source,
    })?;

    let staging = tempfile::Builder::new()
      .prefix(STAGING_PREFIX)
      .tempdir_in(self.store.prefix())
      .map_err(|source| InstallError::Prepare {
        path: self.store.prefix().to_path_buf(),
        source,
      })?;
    debug!(path = %staging.path().display(), "created staging directory");

    let mut report = InstallReport::default();
    for basename in basenames {
      let closure = resolve_closure(&mut self.ctx, &self.store, &self.cache, basename).map_err(|source| {
        InstallError::Resolve {
          basename: basename.clone(),
          source,
        }
      })?;

      for (object, metadata) in closure {
        self.fetch_object(staging.path(), &object, &metadata)?;
        report.installed.push(object);
      }

      report.links.extend(expose_bins(&self.store, basename, &self.bin_dir)?);
    }

    let staging_path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
      warn!(path = %staging_path.display(), error = %e, "failed to remove staging directory");
    }

    info!(
      installed = report.installed.len(),
      links = report.links.len(),
      "install complete"
    );
    Ok(report)
  }

  /// Resolves what [`install`](Self::install) would download, without
  /// downloading or creating anything.
  pub fn plan(mut self, basenames: &[Basename]) -> Result<Vec<(Basename, Metadata)>, InstallError> {
    let mut planned = Vec::new();
    for basename in basenames {
      let closure = resolve_closure(&mut self.ctx, &self.store, &self.cache, basename).map_err(|source| {
        InstallError::Resolve {
          basename: basename.clone(),
          source,
        }
      })?;
      planned.extend(closure);
    }
    Ok(planned)
  }

  fn fetch_object(&mut self, staging: &Path, basename: &Basename, metadata: &Metadata) -> Result<(), InstallError> {
    info!(
      object = %basename,
      url = %metadata.download_url,
      compression = %metadata.compression,
      "downloading"
    );

    let raw = self
      .ctx
      .fetcher()
      .get(&metadata.download_url)
      .map_err(|source| InstallError::Download {
        basename: basename.clone(),
        source,
      })?;

    let unpacked = staging.join(basename.as_str());
    let mut reader = DecompressReader::new(raw, metadata.compression);
    archive::unpack(&unpacked, &mut reader).map_err(|source| InstallError::Unpack {
      basename: basename.clone(),
      source,
    })?;
    reader.finish().map_err(|source| InstallError::Decompress {
      basename: basename.clone(),
      source,
    })?;

    let dest = self.store.path(basename);
    fs::rename(&unpacked, &dest).map_err(|source| InstallError::Publish {
      basename: basename.clone(),
      path: dest.clone(),
      source,
    })?;

    debug!(path = %dest.display(), "published");
    Ok(())
  }
}
