//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{Duration, Utc};
use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable, QueryKey};

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client,
/// providing transparent caching with offline support.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// Ignore fresh entries and always try the network first
  refresh: bool,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::hours(1),
      refresh: false,
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Treat every entry as stale.
  pub fn with_refresh(mut self, refresh: bool) -> Self {
    self.refresh = refresh;
    self
  }

  /// Drop every cached entry.
  pub fn clear(&self) -> Result<()> {
    self.storage.clear()
  }

  /// Check if cached data is stale based on cached_at timestamp.
  fn is_stale(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    self.refresh || Utc::now() - cached_at >= self.stale_time
  }

  /// Fetch a value with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network
  /// 3. On network failure, return stale cache (offline mode)
  /// 4. Update cache with new data
  pub async fn fetch<T, K, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    K: QueryKey,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    // A broken cache must not stop us from reaching the network
    let cached = match self.storage.get::<T, K>(key) {
      Ok(cached) => cached,
      Err(e) => {
        warn!(key = %key.description(), error = %e, "cache read failed");
        None
      }
    };

    if let Some(cached) = cached {
      if !self.is_stale(cached.cached_at) {
        debug!(key = %key.description(), cached_at = %cached.cached_at, "cache hit");
        return Ok(CacheResult::from_cache(cached.value, cached.cached_at));
      }

      // Cache is stale, try to fetch from network
      match fetcher().await {
        Ok(data) => {
          self.store(key, &data);
          Ok(CacheResult::from_network(data))
        }
        Err(e) => {
          warn!(
            key = %key.description(),
            cached_at = %cached.cached_at,
            error = %e,
            "fetch failed, serving stale cache"
          );
          Ok(CacheResult::offline(cached.value, cached.cached_at))
        }
      }
    } else {
      // No cache, must fetch from network
      let data = fetcher().await?;
      self.store(key, &data);
      Ok(CacheResult::from_network(data))
    }
  }

  fn store<T: Cacheable, K: QueryKey>(&self, key: &K, data: &T) {
    if let Err(e) = self.storage.put(key, data) {
      warn!(key = %key.description(), error = %e, "cache write failed");
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
      refresh: self.refresh,
    }
  }
}
