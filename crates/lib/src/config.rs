//! Run configuration.
//!
//! Values are layered, highest precedence first:
//!
//! 1. explicit overrides (command-line flags and positional basenames)
//! 2. environment variables (`FLINGER_STORE`, `FLINGER_BASE`, `FLINGER_BIN_DIR`)
//! 3. the `"flinger"` section of a JSON manifest such as `package.json`, or the
//!    older `"narflinger"` section when that is absent
//! 4. built-in defaults
//!
//! ```json
//! {
//!   "flinger": {
//!     "basenames": ["0c5kx5zw1m5ysdh2bm1x06ykdcrjsaxn-hello-2.12.1"],
//!     "store_prefix": "/tmp/nix/store",
//!     "base": "https://cache.nixos.org"
//!   }
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::cache::BinaryCache;
use crate::consts::{DEFAULT_BASE_URL, DEFAULT_STORE_PREFIX, LEGACY_MANIFEST_SECTION, MANIFEST_SECTION};
use crate::platform::paths::default_bin_dir;
use crate::store::{Basename, StoreError};

pub const STORE_ENV: &str = "FLINGER_STORE";
pub const BASE_ENV: &str = "FLINGER_BASE";
pub const BIN_DIR_ENV: &str = "FLINGER_BIN_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("{path} has no `{MANIFEST_SECTION}` section")]
  MissingSection { path: PathBuf },

  #[error("`{MANIFEST_SECTION}.basenames` unset")]
  MissingBasenames,

  #[error("`{MANIFEST_SECTION}.basenames` empty")]
  EmptyBasenames,

  #[error(transparent)]
  InvalidBasename(#[from] StoreError),

  #[error("invalid cache base URL {url:?}: {source}")]
  InvalidBase {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("cannot determine the bin directory: HOME is not set")]
  NoBinDir,
}

impl ConfigError {
  /// Whether the configuration merely asks for nothing to be done.
  pub fn is_noop(&self) -> bool {
    matches!(
      self,
      ConfigError::MissingSection { .. } | ConfigError::MissingBasenames | ConfigError::EmptyBasenames
    )
  }
}

/// The manifest section as written by the user.
#[derive(Debug, Default, Deserialize)]
pub struct ManifestSection {
  pub basenames: Option<Vec<String>>,
  pub store_prefix: Option<PathBuf>,
  pub base: Option<String>,
  pub bin_dir: Option<PathBuf>,
}

impl ManifestSection {
  /// Reads the section from a JSON manifest, falling back to the
  /// `narflinger` key. `Ok(None)` if the file has neither.
  pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut manifest: serde_json::Value = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let section = [MANIFEST_SECTION, LEGACY_MANIFEST_SECTION]
      .into_iter()
      .find_map(|key| manifest.get_mut(key).map(serde_json::Value::take).filter(|v| !v.is_null()));

    match section {
      None => Ok(None),
      Some(section) => serde_json::from_value(section)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
          path: path.to_path_buf(),
          source,
        }),
    }
  }
}

/// Values given explicitly by the caller; `None` and empty mean "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub basenames: Vec<String>,
  pub store_prefix: Option<PathBuf>,
  pub base: Option<String>,
  pub bin_dir: Option<PathBuf>,
}

/// A fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
  pub basenames: Vec<Basename>,
  pub store_prefix: PathBuf,
  pub cache: BinaryCache,
  pub bin_dir: PathBuf,
}

impl Config {
  /// Resolves the configuration from `overrides`, the environment and the
  /// manifest at `manifest`.
  ///
  /// The manifest is only required when `overrides` names no basenames.
  pub fn load(manifest: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
    let section = if overrides.basenames.is_empty() {
      match ManifestSection::load(manifest)? {
        Some(section) => section,
        None => {
          return Err(ConfigError::MissingSection {
            path: manifest.to_path_buf(),
          });
        }
      }
    } else if manifest.exists() {
      ManifestSection::load(manifest)?.unwrap_or_default()
    } else {
      ManifestSection::default()
    };

    Self::resolve(section, overrides)
  }

  /// Merges a manifest section with the environment and `overrides`.
  pub fn resolve(section: ManifestSection, overrides: Overrides) -> Result<Self, ConfigError> {
    let raw_basenames = if overrides.basenames.is_empty() {
      section.basenames.ok_or(ConfigError::MissingBasenames)?
    } else {
      overrides.basenames
    };
    if raw_basenames.is_empty() {
      return Err(ConfigError::EmptyBasenames);
    }
    let basenames = raw_basenames
      .into_iter()
      .map(Basename::new)
      .collect::<Result<Vec<_>, _>>()?;

    let store_prefix = overrides
      .store_prefix
      .or_else(|| env_path(STORE_ENV))
      .or(section.store_prefix)
      .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PREFIX));

    let base = overrides
      .base
      .or_else(|| std::env::var(BASE_ENV).ok().filter(|v| !v.is_empty()))
      .or(section.base)
      .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let cache = BinaryCache::new(&base).map_err(|source| ConfigError::InvalidBase { url: base.clone(), source })?;

    let bin_dir = overrides
      .bin_dir
      .or_else(|| env_path(BIN_DIR_ENV))
      .or(section.bin_dir)
      .or_else(default_bin_dir)
      .ok_or(ConfigError::NoBinDir)?;

    debug!(
      store = %store_prefix.display(),
      base = %cache.base(),
      bin_dir = %bin_dir.display(),
      count = basenames.len(),
      "resolved configuration"
    );

    Ok(Self {
      basenames,
      store_prefix,
      cache,
      bin_dir,
    })
  }
}

fn env_path(name: &str) -> Option<PathBuf> {
  std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  const HELLO: &str = "0c5kx5zw1m5ysdh2bm1x06ykdcrjsaxn-hello-2.12.1";

  fn clean_env<F: FnOnce()>(f: F) {
    temp_env::with_vars(
      [
        (STORE_ENV, None::<&str>),
        (BASE_ENV, None),
        (BIN_DIR_ENV, None),
        ("HOME", Some("/home/user")),
      ],
      f,
    );
  }

  fn manifest(content: &str) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("package.json");
    std::fs::write(&path, content).unwrap();
    (temp, path)
  }

  #[test]
  #[serial]
  fn loads_section_with_defaults() {
    clean_env(|| {
      let (_temp, path) = manifest(&format!(r#"{{"name": "app", "flinger": {{"basenames": ["{HELLO}"]}}}}"#));

      let config = Config::load(&path, Overrides::default()).unwrap();

      assert_eq!(config.basenames[0].as_str(), HELLO);
      assert_eq!(config.store_prefix, PathBuf::from(DEFAULT_STORE_PREFIX));
      assert_eq!(config.cache.base(), DEFAULT_BASE_URL);
      assert_eq!(config.bin_dir, PathBuf::from("/home/user/.local/bin"));
    });
  }

  #[test]
  #[serial]
  fn manifest_values_are_used() {
    clean_env(|| {
      let (_temp, path) = manifest(&format!(
        r#"{{"flinger": {{"basenames": ["{HELLO}"], "store_prefix": "/opt/store", "base": "https://mirror.example/cache", "bin_dir": "/opt/bin"}}}}"#
      ));

      let config = Config::load(&path, Overrides::default()).unwrap();

      assert_eq!(config.store_prefix, PathBuf::from("/opt/store"));
      assert_eq!(config.cache.base(), "https://mirror.example/cache");
      assert_eq!(config.bin_dir, PathBuf::from("/opt/bin"));
    });
  }

  #[test]
  #[serial]
  fn legacy_section_name_is_read() {
    clean_env(|| {
      let (_temp, path) = manifest(&format!(
        r#"{{"narflinger": {{"basenames": ["{HELLO}"], "store_prefix": "/opt/store"}}}}"#
      ));

      let config = Config::load(&path, Overrides::default()).unwrap();

      assert_eq!(config.basenames[0].as_str(), HELLO);
      assert_eq!(config.store_prefix, PathBuf::from("/opt/store"));
    });
  }

  #[test]
  #[serial]
  fn current_section_name_wins_over_legacy() {
    clean_env(|| {
      let (_temp, path) = manifest(&format!(
        r#"{{"flinger": {{"basenames": ["{HELLO}"]}}, "narflinger": {{"basenames": []}}}}"#
      ));

      let config = Config::load(&path, Overrides::default()).unwrap();

      assert_eq!(config.basenames.len(), 1);
    });
  }

  #[test]
  #[serial]
  fn missing_section_is_noop() {
    clean_env(|| {
      let (_temp, path) = manifest(r#"{"name": "app"}"#);
      let err = Config::load(&path, Overrides::default()).unwrap_err();
      assert!(matches!(err, ConfigError::MissingSection { .. }));
      assert!(err.is_noop());
    });
  }

  #[test]
  #[serial]
  fn missing_or_empty_basenames_are_noop() {
    clean_env(|| {
      let (_temp, path) = manifest(r#"{"flinger": {"store_prefix": "/opt/store"}}"#);
      let err = Config::load(&path, Overrides::default()).unwrap_err();
      assert!(matches!(err, ConfigError::MissingBasenames));
      assert!(err.is_noop());

      let (_temp, path) = manifest(r#"{"flinger": {"basenames": []}}"#);
      let err = Config::load(&path, Overrides::default()).unwrap_err();
      assert!(matches!(err, ConfigError::EmptyBasenames));
      assert!(err.is_noop());
    });
  }

  #[test]
  #[serial]
  fn unreadable_manifest_is_an_error() {
    clean_env(|| {
      let err = Config::load(Path::new("/nonexistent/package.json"), Overrides::default()).unwrap_err();
      assert!(matches!(err, ConfigError::Read { .. }));
      assert!(!err.is_noop());

      let (_temp, path) = manifest("{ not json");
      let err = Config::load(&path, Overrides::default()).unwrap_err();
      assert!(matches!(err, ConfigError::Parse { .. }));
    });
  }

  #[test]
  #[serial]
  fn invalid_basename_is_an_error() {
    clean_env(|| {
      let (_temp, path) = manifest(r#"{"flinger": {"basenames": ["hello"]}}"#);
      let err = Config::load(&path, Overrides::default()).unwrap_err();
      assert!(matches!(err, ConfigError::InvalidBasename(_)));
      assert!(!err.is_noop());
    });
  }

  #[test]
  #[serial]
  fn environment_overrides_manifest() {
    temp_env::with_vars(
      [
        (STORE_ENV, Some("/env/store")),
        (BASE_ENV, Some("https://env.example")),
        (BIN_DIR_ENV, Some("/env/bin")),
      ],
      || {
        let (_temp, path) = manifest(&format!(
          r#"{{"flinger": {{"basenames": ["{HELLO}"], "store_prefix": "/opt/store", "base": "https://mirror.example"}}}}"#
        ));

        let config = Config::load(&path, Overrides::default()).unwrap();

        assert_eq!(config.store_prefix, PathBuf::from("/env/store"));
        assert_eq!(config.cache.base(), "https://env.example");
        assert_eq!(config.bin_dir, PathBuf::from("/env/bin"));
      },
    );
  }

  #[test]
  #[serial]
  fn overrides_win_and_make_manifest_optional() {
    temp_env::with_vars([(STORE_ENV, Some("/env/store"))], || {
      let overrides = Overrides {
        basenames: vec![HELLO.to_string()],
        store_prefix: Some(PathBuf::from("/cli/store")),
        base: Some("https://cli.example".to_string()),
        bin_dir: Some(PathBuf::from("/cli/bin")),
      };

      let config = Config::load(Path::new("/nonexistent/package.json"), overrides).unwrap();

      assert_eq!(config.basenames.len(), 1);
      assert_eq!(config.store_prefix, PathBuf::from("/cli/store"));
      assert_eq!(config.cache.base(), "https://cli.example");
      assert_eq!(config.bin_dir, PathBuf::from("/cli/bin"));
    });
  }

  #[test]
  #[serial]
  fn invalid_base_is_rejected() {
    clean_env(|| {
      let section = ManifestSection {
        basenames: Some(vec![HELLO.to_string()]),
        base: Some("not a url".to_string()),
        ..Default::default()
      };
      let err = Config::resolve(section, Overrides::default()).unwrap_err();
      assert!(matches!(err, ConfigError::InvalidBase { .. }));
    });
  }
}
