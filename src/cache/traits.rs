//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Trait for values that can be cached.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Entity type name for storage organization (e.g., "invoice", "invoice_list")
  fn entity_type() -> &'static str;
}

/// Trait for fetch arguments that identify a cache entry.
pub trait QueryKey {
  /// Stable, fixed-length key for storage lookup
  fn cache_hash(&self) -> String;

  /// Human-readable description for logging
  fn description(&self) -> String;
}

/// How a group of cached values is refreshed and invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
  /// Namespace prefixed to every key stored under this policy
  pub name: &'static str,
  /// How long a cached value is served before the next call refetches it
  pub revalidate: Duration,
  /// Tags that invalidate every value stored under this policy
  pub tags: Vec<String>,
}

impl CachePolicy {
  pub fn new(name: &'static str, revalidate: Duration, tags: &[&str]) -> Self {
    Self {
      name,
      revalidate,
      tags: tags.iter().map(|t| t.to_string()).collect(),
    }
  }

  /// Storage key for a query under this policy.
  pub fn storage_key(&self, key: &str) -> String {
    format!("{}:{}", self.name, key)
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the fetcher
  Network,
  /// Data from cache, within its revalidate window
  Cache,
}
