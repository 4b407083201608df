//! Dependency closure resolution.
//!
//! Expands a requested object into the objects that still have to be fetched,
//! ordered so that every object comes after everything it references.

use tracing::debug;

use crate::cache::BinaryCache;
use crate::context::RunContext;
use crate::metadata::{Metadata, MetadataError, fetch_metadata};
use crate::store::{Basename, Store, StoreError};
use crate::transport::Fetch;

#[derive(Debug, thiserror::Error)]
pub enum ClosureError {
  #[error("failed to resolve {basename}: {source}")]
  Metadata {
    basename: Basename,
    #[source]
    source: MetadataError,
  },

  #[error(transparent)]
  Store(#[from] StoreError),
}

enum Frame {
  Enter(Basename),
  Emit(Basename, Metadata),
}

/// Resolves the closure of `basename` against the store and the cache.
///
/// Objects already scheduled in this run, or already present in the store,
/// are skipped together with their references; present objects cost no
/// network access. Every other object is emitted once, after all of its
/// references, in the order a depth-first walk of the reference lists
/// finishes them.
pub fn resolve_closure<F: Fetch>(
  ctx: &mut RunContext<F>,
  store: &Store,
  cache: &BinaryCache,
  basename: &Basename,
) -> Result<Vec<(Basename, Metadata)>, ClosureError> {
  let mut ordered = Vec::new();
  let mut stack = vec![Frame::Enter(basename.clone())];

  while let Some(frame) = stack.pop() {
    match frame {
      Frame::Emit(basename, metadata) => ordered.push((basename, metadata)),
      Frame::Enter(basename) => {
        if !ctx.schedule(&basename) {
          continue;
        }
        if store.contains(&basename)? {
          debug!(path = %store.path(&basename).display(), "already present");
          continue;
        }

        let metadata = fetch_metadata(ctx.fetcher(), cache, basename.hash_prefix())
          .map_err(|source| ClosureError::Metadata {
            basename: basename.clone(),
            source,
          })?;

        let references: Vec<Basename> = metadata.references.iter().rev().cloned().collect();
        stack.push(Frame::Emit(basename, metadata));
        stack.extend(references.into_iter().map(Frame::Enter));
      }
    }
  }

  Ok(ordered)
}
