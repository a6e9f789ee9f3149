//! Single-flight de-duplication of concurrent fetches.

use color_eyre::{eyre::eyre, Report, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Error shared by every caller waiting on the same fetch.
#[derive(Clone)]
pub struct SharedError(Arc<Report>);

impl SharedError {
  fn new(report: Report) -> Self {
    Self(Arc::new(report))
  }
}

impl fmt::Display for SharedError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&*self.0, f)
  }
}

impl fmt::Debug for SharedError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

impl std::error::Error for SharedError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    self.0.chain().nth(1)
  }
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, SharedError>>>;

struct InFlight<T> {
  id: u64,
  fetch: SharedFetch<T>,
}

/// Registry of in-flight fetches keyed by request key.
///
/// Concurrent calls for the same key share one underlying fetch and observe
/// the same value or error. The entry is removed as soon as the fetch
/// settles, so failures are never remembered past their own flight.
pub struct SingleFlight<T> {
  in_flight: Arc<DashMap<String, InFlight<T>>>,
  next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      in_flight: Arc::new(DashMap::new()),
      next_id: AtomicU64::new(0),
    }
  }

  /// Run `fetch` for `key` unless a fetch for `key` is already in flight,
  /// in which case wait for that one instead.
  ///
  /// The fetch runs as its own task: it completes even if every caller
  /// stops waiting.
  pub async fn get_with_dedup<F, Fut>(&self, key: &str, fetch: F) -> Result<T>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    // Check-and-insert happens under the entry lock, before any await.
    let shared = match self.in_flight.entry(key.to_string()) {
      Entry::Occupied(entry) => {
        debug!(key, "joining in-flight fetch");
        entry.get().fetch.clone()
      }
      Entry::Vacant(entry) => {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = InFlightGuard {
          in_flight: Arc::clone(&self.in_flight),
          key: key.to_string(),
          id,
        };
        let fut = fetch();
        let task = tokio::spawn(async move {
          let _guard = guard;
          fut.await.map_err(SharedError::new)
        });
        let shared = async move {
          match task.await {
            Ok(result) => result,
            Err(e) => Err(SharedError::new(eyre!("Fetch task failed: {}", e))),
          }
        }
        .boxed()
        .shared();
        entry.insert(InFlight {
          id,
          fetch: shared.clone(),
        });
        shared
      }
    };

    shared.await.map_err(Report::new)
  }

  /// Number of fetches currently in flight.
  pub fn in_flight(&self) -> usize {
    self.in_flight.len()
  }
}

impl<T> Default for SingleFlight<T>
where
  T: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

/// Removes the registry entry when the fetch task ends, including on panic.
struct InFlightGuard<T> {
  in_flight: Arc<DashMap<String, InFlight<T>>>,
  key: String,
  id: u64,
}

impl<T> Drop for InFlightGuard<T> {
  fn drop(&mut self) {
    self
      .in_flight
      .remove_if(&self.key, |_, flight| flight.id == self.id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicU32;
  use tokio::sync::oneshot;

  #[tokio::test]
  async fn test_concurrent_calls_share_one_fetch() {
    let flights: SingleFlight<u32> = SingleFlight::new();
    let calls = Arc::new(AtomicU32::new(0));
    let (tx, rx) = oneshot::channel::<u32>();

    let fetch = |calls: Arc<AtomicU32>, rx: Option<oneshot::Receiver<u32>>| {
      calls.fetch_add(1, Ordering::SeqCst);
      async move {
        let value = match rx {
          Some(rx) => rx.await.map_err(|e| eyre!("Sender dropped: {}", e))?,
          None => 0,
        };
        Ok::<u32, Report>(value)
      }
    };

    let first = flights.get_with_dedup("K", || fetch(Arc::clone(&calls), Some(rx)));
    let second = flights.get_with_dedup("K", || fetch(Arc::clone(&calls), None));
    let release = async {
      tokio::task::yield_now().await;
      tx.send(42).unwrap();
    };

    let (a, b, ()) = tokio::join!(first, second, release);

    assert_eq!(a.unwrap(), 42);
    assert_eq!(b.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(flights.in_flight(), 0);
  }

  #[tokio::test]
  async fn test_concurrent_callers_see_the_same_error() {
    let flights: SingleFlight<u32> = SingleFlight::new();
    let calls = Arc::new(AtomicU32::new(0));
    let (tx, rx) = oneshot::channel::<()>();

    let calls_a = Arc::clone(&calls);
    let first = flights.get_with_dedup("K", move || {
      calls_a.fetch_add(1, Ordering::SeqCst);
      async move {
        let _ = rx.await;
        Err::<u32, _>(eyre!("Notion API error 502"))
      }
    });
    let calls_b = Arc::clone(&calls);
    let second = flights.get_with_dedup("K", move || {
      calls_b.fetch_add(1, Ordering::SeqCst);
      async { Ok(1) }
    });
    let release = async {
      tokio::task::yield_now().await;
      let _ = tx.send(());
    };

    let (a, b, ()) = tokio::join!(first, second, release);

    let (a, b) = (a.unwrap_err(), b.unwrap_err());
    assert_eq!(a.to_string(), "Notion API error 502");
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_failure_does_not_poison_key() {
    let flights: SingleFlight<u32> = SingleFlight::new();
    let calls = Arc::new(AtomicU32::new(0));

    let calls_a = Arc::clone(&calls);
    let failed = flights
      .get_with_dedup("K", move || {
        calls_a.fetch_add(1, Ordering::SeqCst);
        async { Err::<u32, _>(eyre!("boom")) }
      })
      .await;
    assert!(failed.is_err());
    assert_eq!(flights.in_flight(), 0);

    let calls_b = Arc::clone(&calls);
    let ok = flights
      .get_with_dedup("K", move || {
        calls_b.fetch_add(1, Ordering::SeqCst);
        async { Ok(5) }
      })
      .await;
    assert_eq!(ok.unwrap(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_sequential_calls_fetch_again() {
    let flights: SingleFlight<u32> = SingleFlight::new();
    let calls = Arc::new(AtomicU32::new(0));

    for expected in 1..=3 {
      let calls = Arc::clone(&calls);
      let value = flights
        .get_with_dedup("K", move || async move {
          Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
        })
        .await
        .unwrap();
      assert_eq!(value, expected);
    }
  }

  #[tokio::test]
  async fn test_different_keys_do_not_share() {
    let flights: SingleFlight<&'static str> = SingleFlight::new();

    let (a, b) = tokio::join!(
      flights.get_with_dedup("A", || async { Ok("a") }),
      flights.get_with_dedup("B", || async { Ok("b") }),
    );

    assert_eq!(a.unwrap(), "a");
    assert_eq!(b.unwrap(), "b");
  }

  #[tokio::test]
  async fn test_fetch_completes_after_callers_give_up() {
    let flights: SingleFlight<u32> = SingleFlight::new();
    let (done_tx, done_rx) = oneshot::channel::<()>();

    let call = flights.get_with_dedup("K", move || async move {
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
      let _ = done_tx.send(());
      Ok(1)
    });
    // Poll once so the fetch is dispatched, then abandon the caller.
    let _ = tokio::time::timeout(std::time::Duration::from_millis(1), call).await;

    done_rx.await.unwrap();
    tokio::task::yield_now().await;
    assert_eq!(flights.in_flight(), 0);
  }

  #[tokio::test]
  async fn test_panicking_fetch_is_reported_and_cleared() {
    let flights: SingleFlight<u32> = SingleFlight::new();

    let result = flights
      .get_with_dedup("K", || async {
        if true {
          panic!("fetch panicked");
        }
        Ok(0)
      })
      .await;

    assert!(result.unwrap_err().to_string().contains("Fetch task failed"));
    assert_eq!(flights.in_flight(), 0);
  }

  #[test]
  fn test_shared_error_keeps_source_chain() {
    use color_eyre::eyre::WrapErr;

    let report = Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "socket closed"))
      .wrap_err("Failed to get invoice")
      .unwrap_err();
    let shared = SharedError::new(report);

    assert_eq!(shared.to_string(), "Failed to get invoice");
    let source = std::error::Error::source(&shared).unwrap();
    assert_eq!(source.to_string(), "socket closed");
  }
}
