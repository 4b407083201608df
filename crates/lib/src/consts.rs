pub const APP_NAME: &str = "flinger";

/// Number of leading basename characters that identify a store object.
pub const HASH_PREFIX_LEN: usize = 32;

/// Extension of the metadata documents served by the binary cache.
pub const METADATA_EXT: &str = "narinfo";

/// Literal that opens every archive stream.
pub const ARCHIVE_MAGIC: &[u8] = b"nix-archive-1";

/// Redirects followed by a single GET before giving up.
pub const MAX_REDIRECTS: usize = 5;

pub const DEFAULT_STORE_PREFIX: &str = "/tmp/nix/store";
pub const DEFAULT_BASE_URL: &str = "https://cache.nixos.org";
pub const DEFAULT_MANIFEST: &str = "package.json";

/// Key of the manifest section holding our configuration.
pub const MANIFEST_SECTION: &str = "flinger";

/// Older name of the manifest section, read when [`MANIFEST_SECTION`] is absent.
pub const LEGACY_MANIFEST_SECTION: &str = "narflinger";

/// Prefix of the per-run staging directory created inside the store.
pub const STAGING_PREFIX: &str = "install-";
