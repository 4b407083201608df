//! Shared utilities.
//!
//! Currently only test helpers: an in-memory binary cache and compressors.

#[cfg(test)]
pub mod testutil;
