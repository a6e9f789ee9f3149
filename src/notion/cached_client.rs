//! Cached Notion client that wraps NotionClient with transparent caching.

use color_eyre::Result;
use tracing::debug;

use crate::cache::{CacheLayer, CacheResult, CachedFetcher, Storage};
use crate::config::{CacheConfig, Config};

use super::cache::{invoice_list_policy, invoice_policy, InvoiceKey, InvoiceListQuery};
use super::client::NotionClient;
use super::types::{Invoice, InvoiceList};

/// Notion client with transparent caching support.
///
/// Single invoices and invoice listings are cached under their own policies;
/// each can be dropped independently through its tag.
#[derive(Clone)]
pub struct CachedInvoiceClient {
  cache: CacheLayer<Storage>,
  invoices: CachedFetcher<Storage, InvoiceKey, Invoice>,
  lists: CachedFetcher<Storage, InvoiceListQuery, InvoiceList>,
}

impl CachedInvoiceClient {
  /// Create a cached client using the configured backend.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = NotionClient::new(config)?;
    let storage = Storage::from_config(&config.cache)?;

    Ok(Self::with_storage(inner, storage, &config.cache))
  }

  pub fn with_storage(inner: NotionClient, storage: Storage, config: &CacheConfig) -> Self {
    let cache = CacheLayer::new(storage);

    let client = inner.clone();
    let invoices = cache.wrap(invoice_policy(config), move |key: InvoiceKey| {
      let client = client.clone();
      async move { client.get_invoice(&key.page_id).await }
    });

    let client = inner;
    let lists = cache.wrap(invoice_list_policy(config), move |query: InvoiceListQuery| {
      let client = client.clone();
      async move {
        client
          .list_invoices(query.page_size, query.start_cursor.as_deref(), query.sort)
          .await
      }
    });

    Self {
      cache,
      invoices,
      lists,
    }
  }

  /// Get a single invoice with caching.
  pub async fn get_invoice(&self, page_id: &str) -> Result<CacheResult<Invoice>> {
    let result = self.invoices.call(InvoiceKey::new(page_id)).await?;
    debug!(page_id, source = ?result.source, cached_at = ?result.cached_at, "invoice ready");
    Ok(result)
  }

  /// Get one page of invoices with caching.
  pub async fn list_invoices(&self, query: InvoiceListQuery) -> Result<CacheResult<InvoiceList>> {
    let result = self.lists.call(query).await?;
    debug!(
      invoices = result.data.invoices.len(),
      source = ?result.source,
      cached_at = ?result.cached_at,
      "invoice list ready"
    );
    Ok(result)
  }

  /// Drop every cached value carrying `tag`.
  pub fn invalidate(&self, tag: &str) -> Result<usize> {
    self.cache.invalidate(tag)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage, NoopStorage};
  use crate::notion::cache::{INVOICE_LIST_TAG, INVOICE_TAG};
  use crate::notion::testing::MockNotion;

  fn cached(mock: &MockNotion, storage: Storage) -> CachedInvoiceClient {
    CachedInvoiceClient::with_storage(mock.client(), storage, &CacheConfig::default())
  }

  #[tokio::test]
  async fn test_invoice_is_served_from_cache() {
    let mock = MockNotion::start().await;
    mock.insert_invoice("inv-1", "INV-1", &[("item-1", 100)]);
    let client = cached(&mock, Storage::Memory(MemoryStorage::new()));

    let first = client.get_invoice("inv-1").await.unwrap();
    let second = client.get_invoice("inv-1").await.unwrap();

    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(first.data, second.data);
    assert_eq!(mock.page_requests(), 2);
  }

  #[tokio::test]
  async fn test_invalidating_invoice_tag_keeps_lists() {
    let mock = MockNotion::start().await;
    mock.insert_invoice("inv-1", "INV-1", &[]);
    mock.set_query_results(&["inv-1"], false, None);
    let client = cached(&mock, Storage::Memory(MemoryStorage::new()));

    client.get_invoice("inv-1").await.unwrap();
    client.list_invoices(InvoiceListQuery::default()).await.unwrap();

    assert_eq!(client.invalidate(INVOICE_TAG).unwrap(), 1);

    let invoice = client.get_invoice("inv-1").await.unwrap();
    let list = client.list_invoices(InvoiceListQuery::default()).await.unwrap();
    assert_eq!(invoice.source, CacheSource::Network);
    assert_eq!(list.source, CacheSource::Cache);

    assert_eq!(client.invalidate(INVOICE_LIST_TAG).unwrap(), 1);
    let list = client.list_invoices(InvoiceListQuery::default()).await.unwrap();
    assert_eq!(list.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_failures_are_not_cached() {
    let mock = MockNotion::start().await;
    mock.insert_invoice("inv-1", "INV-1", &[]);
    let client = cached(&mock, Storage::Memory(MemoryStorage::new()));

    mock.set_failing(true);
    assert!(client.get_invoice("inv-1").await.is_err());

    mock.set_failing(false);
    let invoice = client.get_invoice("inv-1").await.unwrap();
    assert_eq!(invoice.source, CacheSource::Network);
    assert_eq!(invoice.data.invoice_number, "INV-1");
  }

  #[tokio::test]
  async fn test_disabled_cache_goes_to_notion_every_time() {
    let mock = MockNotion::start().await;
    mock.insert_invoice("inv-1", "INV-1", &[]);
    let client = cached(&mock, Storage::Noop(NoopStorage));

    client.get_invoice("inv-1").await.unwrap();
    client.get_invoice("inv-1").await.unwrap();

    assert_eq!(mock.page_requests(), 2);
  }
}
