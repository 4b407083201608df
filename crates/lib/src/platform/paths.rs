use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory exposed binaries are linked into (`~/.local/bin`)
pub fn default_bin_dir() -> Option<PathBuf> {
  home_dir().map(|home| home.join(".local").join("bin"))
}
