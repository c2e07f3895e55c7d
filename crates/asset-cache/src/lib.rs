//! Asset Cache
//!
//! Turns an `(AssetId, SourceLocator)` pair into a stable local `Handle`
//! for the asset's bytes. Bytes persist in a namespaced blob store across
//! restarts, concurrent lookups of one id share a single fetch, and a
//! changed locator for a known id evicts the old bytes before anything new
//! is materialized.
//!
//! Within a process, resolving the same pair twice yields the same handle
//! (pointer identity), so consumers can compare handles to decide whether
//! anything changed.

pub mod cache;
pub mod coordinator;
pub mod display;
mod entry;
pub mod error;
pub mod handle;
pub mod registry;
pub mod tracker;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{AssetCache, AssetCacheBuilder};
pub use display::{DisplaySlot, Transition};
pub use error::{CacheError, Result};
pub use handle::{Handle, HandleFactory, LocalAsset};
pub use types::{AssetId, CacheStats, SourceLocator};
