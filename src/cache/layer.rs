//! Cache layer that orchestrates caching logic with network fetching.

use chrono::Utc;
use color_eyre::Result;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::storage::CacheStorage;
use super::traits::{CachePolicy, CacheResult, Cacheable, QueryKey};

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the service and the network client. Values are
/// served from storage until their policy's revalidate window has elapsed;
/// after that the next call goes to the fetcher and refreshes storage.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// Check if a value cached at `cached_at` has outlived the policy's window.
  fn is_stale(policy: &CachePolicy, cached_at: chrono::DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(policy.revalidate) {
      Ok(window) => Utc::now() - cached_at >= window,
      Err(_) => false,
    }
  }

  /// Get a value from cache, or produce and store it.
  ///
  /// 1. Check cache - if within the revalidate window, return immediately
  /// 2. If stale/missing, call the fetcher
  /// 3. On fetcher failure, propagate the error and leave the cache untouched
  /// 4. Store the fresh value under the policy's tags
  pub async fn fetch<T, F, Fut>(
    &self,
    policy: &CachePolicy,
    key: &str,
    fetcher: F,
  ) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let storage_key = policy.storage_key(key);

    if let Some(cached) = self.storage.get_entry::<T>(&storage_key)? {
      if !Self::is_stale(policy, cached.cached_at) {
        debug!(policy = policy.name, key, "cache hit");
        return Ok(CacheResult::from_cache(cached.value, cached.cached_at));
      }
      debug!(policy = policy.name, key, "cache stale, revalidating");
    } else {
      debug!(policy = policy.name, key, "cache miss");
    }

    let data = fetcher().await?;
    self.storage.store_entry(&storage_key, &data, &policy.tags)?;
    Ok(CacheResult::from_network(data))
  }

  /// Wrap an async fetch function so its results are cached under `policy`.
  ///
  /// The cache key of each call is derived from its argument.
  pub fn wrap<A, T, F, Fut>(&self, policy: CachePolicy, fetch: F) -> CachedFetcher<S, A, T>
  where
    A: QueryKey + Send + 'static,
    T: Cacheable,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    CachedFetcher {
      cache: self.clone(),
      policy,
      fetch: Arc::new(move |arg| fetch(arg).boxed()),
    }
  }

  /// Drop every cached value carrying `tag`.
  pub fn invalidate(&self, tag: &str) -> Result<usize> {
    let removed = self.storage.invalidate_tag(tag)?;
    debug!(tag, removed, "cache tag invalidated");
    Ok(removed)
  }

  /// Drop every cached value.
  pub fn clear(&self) -> Result<()> {
    self.storage.clear()
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

type FetchFn<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Fetch function with a cache in front of it, created by [`CacheLayer::wrap`].
pub struct CachedFetcher<S: CacheStorage, A, T> {
  cache: CacheLayer<S>,
  policy: CachePolicy,
  fetch: FetchFn<A, T>,
}

impl<S, A, T> CachedFetcher<S, A, T>
where
  S: CacheStorage,
  A: QueryKey + Send + 'static,
  T: Cacheable,
{
  pub async fn call(&self, arg: A) -> Result<CacheResult<T>> {
    let key = arg.cache_hash();
    debug!(policy = self.policy.name, query = %arg.description(), "cached fetch");
    let fetch = Arc::clone(&self.fetch);
    self.cache.fetch(&self.policy, &key, move || fetch(arg)).await
  }
}

impl<S: CacheStorage, A, T> Clone for CachedFetcher<S, A, T> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      policy: self.policy.clone(),
      fetch: Arc::clone(&self.fetch),
    }
  }
}
