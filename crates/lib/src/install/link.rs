//! Exposing an object's binaries in the user's bin directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::InstallError;
use crate::store::{Basename, Store};

/// What happened to one link in the bin directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOutcome {
  Created,
  Unchanged,
  /// A link into some other store object was repointed.
  Replaced,
  /// A symlink pointing outside the store was left alone.
  ForeignSymlink,
  /// A regular file or directory was left alone.
  NotSymlink,
}

impl LinkOutcome {
  /// Whether the link path is left not pointing at the requested binary.
  pub fn is_conflict(&self) -> bool {
    matches!(self, LinkOutcome::ForeignSymlink | LinkOutcome::NotSymlink)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkReport {
  pub link: PathBuf,
  pub target: PathBuf,
  pub outcome: LinkOutcome,
}

/// Links every entry of `<object>/bin` into `bin_dir`, in name order.
///
/// An object without a `bin` directory exposes nothing. That includes objects
/// that are a single file and objects whose `bin` is not a directory.
pub fn expose_bins(store: &Store, basename: &Basename, bin_dir: &Path) -> Result<Vec<LinkReport>, InstallError> {
  let bin = store.path(basename).join("bin");
  let is_dir = match fs::metadata(&bin) {
    Ok(metadata) => metadata.is_dir(),
    Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => false,
    Err(source) => return Err(InstallError::Probe { path: bin, source }),
  };
  if !is_dir {
    debug!(object = %basename, "no bin directory");
    return Ok(Vec::new());
  }

  let entries = fs::read_dir(&bin).map_err(|source| InstallError::Probe {
    path: bin.clone(),
    source,
  })?;

  let mut names = entries
    .map(|entry| entry.map(|e| e.file_name()))
    .collect::<Result<Vec<_>, _>>()
    .map_err(|source| InstallError::Probe {
      path: bin.clone(),
      source,
    })?;
  names.sort();

  names
    .into_iter()
    .map(|name| {
      let link = bin_dir.join(&name);
      let target = bin.join(&name);
      let outcome = link_one(store, &link, &target)?;
      Ok(LinkReport { link, target, outcome })
    })
    .collect()
}

/// Makes `link` a symlink to `target` unless something not owned by the store
/// is already there.
pub fn link_one(store: &Store, link: &Path, target: &Path) -> Result<LinkOutcome, InstallError> {
  let outcome = match fs::read_link(link) {
    Ok(current) if current == target => LinkOutcome::Unchanged,
    Ok(current) if store.owns(&current) => {
      fs::remove_file(link).map_err(|source| InstallError::Link {
        link: link.to_path_buf(),
        source,
      })?;
      create_symlink(target, link)?;
      LinkOutcome::Replaced
    }
    Ok(current) => {
      warn!(link = %link.display(), points_to = %current.display(), "refusing to replace symlink outside the store");
      LinkOutcome::ForeignSymlink
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      create_symlink(target, link)?;
      LinkOutcome::Created
    }
    Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
      warn!(link = %link.display(), "refusing to replace a file that is not a symlink");
      LinkOutcome::NotSymlink
    }
    Err(source) => {
      return Err(InstallError::Probe {
        path: link.to_path_buf(),
        source,
      });
    }
  };

  debug!(link = %link.display(), ?outcome, "linked");
  Ok(outcome)
}

fn create_symlink(target: &Path, link: &Path) -> Result<(), InstallError> {
  #[cfg(unix)]
  let result = std::os::unix::fs::symlink(target, link);
  #[cfg(windows)]
  let result = std::os::windows::fs::symlink_file(target, link);

  result.map_err(|source| InstallError::Link {
    link: link.to_path_buf(),
    source,
  })
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
  use super::*;
  use crate::util::testutil::basename;
  use std::os::unix::fs::symlink;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  struct Fixture {
    _temp: TempDir,
    store: Store,
    bin_dir: PathBuf,
    object: Basename,
  }

  fn fixture(bins: &[&str]) -> Fixture {
    let temp = TempDir::new().unwrap();
    let store = Store::open(temp.path().join("store")).unwrap();
    let bin_dir = temp.path().join("bin");
    fs::create_dir(&bin_dir).unwrap();

    let object = basename('h', "hello-2.12.1");
    let object_bin = store.path(&object).join("bin");
    fs::create_dir_all(&object_bin).unwrap();
    for bin in bins {
      fs::write(object_bin.join(bin), "#!/bin/sh\n").unwrap();
    }

    Fixture {
      _temp: temp,
      store,
      bin_dir,
      object,
    }
  }

  fn outcomes(reports: &[LinkReport]) -> Vec<LinkOutcome> {
    reports.iter().map(|r| r.outcome).collect()
  }

  #[test]
  fn creates_links_in_name_order() {
    let fx = fixture(&["zed", "hello", "abc"]);

    let reports = expose_bins(&fx.store, &fx.object, &fx.bin_dir).unwrap();

    let names: Vec<_> = reports.iter().map(|r| r.link.file_name().unwrap().to_owned()).collect();
    assert_eq!(names, ["abc", "hello", "zed"]);
    assert_eq!(outcomes(&reports), vec![LinkOutcome::Created; 3]);
    assert_eq!(
      fs::read_link(fx.bin_dir.join("hello")).unwrap(),
      fx.store.path(&fx.object).join("bin/hello")
    );
  }

  #[test]
  fn exposure_is_idempotent() {
    let fx = fixture(&["hello"]);

    expose_bins(&fx.store, &fx.object, &fx.bin_dir).unwrap();
    let again = expose_bins(&fx.store, &fx.object, &fx.bin_dir).unwrap();

    assert_eq!(outcomes(&again), vec![LinkOutcome::Unchanged]);
    assert_eq!(fs::read_dir(&fx.bin_dir).unwrap().count(), 1);
  }

  #[test]
  fn object_without_bin_exposes_nothing() {
    let fx = fixture(&[]);
    let other = basename('o', "data-only");
    fs::create_dir(fx.store.path(&other)).unwrap();

    assert!(expose_bins(&fx.store, &other, &fx.bin_dir).unwrap().is_empty());
  }

  #[test]
  fn single_file_object_exposes_nothing() {
    let fx = fixture(&[]);
    let patch = basename('p', "fix.patch");
    fs::write(fx.store.path(&patch), "diff").unwrap();

    assert!(expose_bins(&fx.store, &patch, &fx.bin_dir).unwrap().is_empty());
  }

  #[test]
  fn bin_file_exposes_nothing() {
    let fx = fixture(&[]);
    let odd = basename('o', "odd");
    fs::create_dir(fx.store.path(&odd)).unwrap();
    fs::write(fx.store.path(&odd).join("bin"), "not a directory").unwrap();

    assert!(expose_bins(&fx.store, &odd, &fx.bin_dir).unwrap().is_empty());
    assert_eq!(fs::read_dir(&fx.bin_dir).unwrap().count(), 0);
  }

  #[test]
  fn repoints_link_into_other_store_object() {
    let fx = fixture(&["hello"]);
    let old = fx.store.prefix().join(format!("{}-hello-2.10", "o".repeat(32))).join("bin/hello");
    symlink(&old, fx.bin_dir.join("hello")).unwrap();

    let reports = expose_bins(&fx.store, &fx.object, &fx.bin_dir).unwrap();

    assert_eq!(outcomes(&reports), vec![LinkOutcome::Replaced]);
    assert_eq!(fs::read_link(fx.bin_dir.join("hello")).unwrap(), reports[0].target);
  }

  #[test]
  #[traced_test]
  fn leaves_foreign_symlink_alone() {
    let fx = fixture(&["hello"]);
    symlink("/usr/bin/hello", fx.bin_dir.join("hello")).unwrap();

    let reports = expose_bins(&fx.store, &fx.object, &fx.bin_dir).unwrap();

    assert_eq!(outcomes(&reports), vec![LinkOutcome::ForeignSymlink]);
    assert!(reports[0].outcome.is_conflict());
    assert_eq!(fs::read_link(fx.bin_dir.join("hello")).unwrap(), PathBuf::from("/usr/bin/hello"));
    assert!(logs_contain("refusing to replace symlink outside the store"));
  }

  #[test]
  fn sibling_prefix_is_not_the_store() {
    let fx = fixture(&["hello"]);
    let sibling = PathBuf::from(format!("{}-other/bin/hello", fx.store.prefix().display()));
    symlink(&sibling, fx.bin_dir.join("hello")).unwrap();

    let reports = expose_bins(&fx.store, &fx.object, &fx.bin_dir).unwrap();

    assert_eq!(outcomes(&reports), vec![LinkOutcome::ForeignSymlink]);
  }

  #[test]
  fn link_escaping_the_store_is_foreign() {
    let fx = fixture(&["hello"]);
    let escaping = fx.store.prefix().join("../outside/bin/hello");
    symlink(&escaping, fx.bin_dir.join("hello")).unwrap();

    let reports = expose_bins(&fx.store, &fx.object, &fx.bin_dir).unwrap();

    assert_eq!(outcomes(&reports), vec![LinkOutcome::ForeignSymlink]);
    assert_eq!(fs::read_link(fx.bin_dir.join("hello")).unwrap(), escaping);
  }

  #[test]
  #[traced_test]
  fn leaves_regular_file_alone() {
    let fx = fixture(&["hello"]);
    fs::write(fx.bin_dir.join("hello"), "mine").unwrap();

    let reports = expose_bins(&fx.store, &fx.object, &fx.bin_dir).unwrap();

    assert_eq!(outcomes(&reports), vec![LinkOutcome::NotSymlink]);
    assert_eq!(fs::read_to_string(fx.bin_dir.join("hello")).unwrap(), "mine");
    assert!(logs_contain("not a symlink"));
  }
}
