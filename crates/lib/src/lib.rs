//! flinger-lib: fetch store objects from a binary cache and install them
//!
//! The pieces, in the order a run uses them:
//! - `config`: where the store, the cache and the bin directory are
//! - `closure`: which objects still have to be fetched, references first
//! - `metadata` / `transport`: the cache's `.narinfo` documents over HTTPS
//! - `decompress` / `archive`: turning a download into a directory tree
//! - `install`: staging, atomic publish and binary exposure

pub mod archive;
pub mod cache;
pub mod closure;
pub mod config;
pub mod consts;
pub mod context;
pub mod decompress;
pub mod install;
pub mod metadata;
pub mod platform;
pub mod store;
pub mod transport;
pub mod util;

pub use cache::BinaryCache;
pub use config::{Config, ConfigError, Overrides};
pub use install::{ErrorClass, InstallError, InstallReport, Installer};
pub use store::{Basename, Store};
pub use transport::{Fetch, HttpsTransport};
