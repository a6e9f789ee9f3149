//! Caching and request de-duplication in front of the Notion API.
//!
//! Two independent layers:
//! - `CacheLayer` serves values from storage until their policy's revalidate
//!   window elapses, with tag-based invalidation (minutes scale)
//! - `SingleFlight` collapses concurrent calls for the same key into one
//!   in-flight fetch (milliseconds scale)
//!
//! Callers put the single-flight registry in front of a cached fetcher.

mod dedup;
mod layer;
mod storage;
mod traits;

pub use dedup::SingleFlight;
pub use layer::{CacheLayer, CachedFetcher};
pub use storage::Storage;
pub use traits::{CachePolicy, CacheResult, Cacheable, QueryKey};

#[cfg(test)]
pub use storage::{MemoryStorage, NoopStorage};
#[cfg(test)]
pub use traits::CacheSource;
