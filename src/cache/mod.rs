//! Generic response cache with offline fallback.
//!
//! This module is Jira-agnostic:
//! - Stores serialized values under a hashed query key
//! - Serves fresh entries without touching the network
//! - Refetches stale entries, falling back to them when the fetch fails
//! - Backends: JSON files, SQLite, or nothing at all

mod layer;
pub(crate) mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::Storage;
pub use traits::{CacheSource, Cacheable, QueryKey};
