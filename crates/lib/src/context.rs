//! State shared by every operation of one install run.

use std::collections::HashSet;

use crate::store::Basename;
use crate::transport::Fetch;

/// Run-scoped state: the transport (and with it the per-host connection cache)
/// plus the hash prefixes already scheduled in this run.
///
/// Create one per run and drop it when the run ends; dropping closes the
/// cached connections.
pub struct RunContext<F> {
  fetcher: F,
  scheduled: HashSet<String>,
}

impl<F: Fetch> RunContext<F> {
  pub fn new(fetcher: F) -> Self {
    Self {
      fetcher,
      scheduled: HashSet::new(),
    }
  }

  pub fn fetcher(&mut self) -> &mut F {
    &mut self.fetcher
  }

  /// Marks `basename` as scheduled. Returns false if an object with the same
  /// hash prefix was already scheduled in this run.
  pub fn schedule(&mut self, basename: &Basename) -> bool {
    self.scheduled.insert(basename.hash_prefix().to_string())
  }

  pub fn into_fetcher(self) -> F {
    self.fetcher
  }
}
