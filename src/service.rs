//! Invoice retrieval: single-flight dedup in front of the cached Notion client.

use color_eyre::Result;
use tracing::debug;

use crate::cache::{QueryKey, SingleFlight};
use crate::config::Config;
use crate::filter::InvoiceFilter;
use crate::notion::cache::{InvoiceKey, InvoiceListQuery};
use crate::notion::cached_client::CachedInvoiceClient;
use crate::notion::types::{Invoice, InvoiceList};

pub struct InvoiceService {
  client: CachedInvoiceClient,
  invoices: SingleFlight<Invoice>,
  lists: SingleFlight<InvoiceList>,
}

impl InvoiceService {
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self::with_client(CachedInvoiceClient::new(config)?))
  }

  pub fn with_client(client: CachedInvoiceClient) -> Self {
    Self {
      client,
      invoices: SingleFlight::new(),
      lists: SingleFlight::new(),
    }
  }

  /// Get one invoice. Concurrent calls for the same page share one fetch.
  pub async fn get_invoice(&self, page_id: &str) -> Result<Invoice> {
    let key = InvoiceKey::new(page_id);
    debug!(
      query = %key.description(),
      in_flight = self.invoices.in_flight(),
      "get invoice"
    );

    let hash = key.cache_hash();
    self
      .invoices
      .get_with_dedup(&hash, || {
        let client = self.client.clone();
        async move {
          client
            .get_invoice(&key.page_id)
            .await
            .map(|result| result.data)
        }
      })
      .await
  }

  /// Get one page of invoices and apply `filter` to it.
  ///
  /// Concurrent calls for the same page share one fetch; the filter is
  /// applied per caller afterwards.
  pub async fn list_invoices(
    &self,
    query: InvoiceListQuery,
    filter: &InvoiceFilter,
  ) -> Result<InvoiceList> {
    debug!(
      query = %query.description(),
      filters = filter.active_count(),
      in_flight = self.lists.in_flight(),
      "list invoices"
    );

    let hash = query.cache_hash();
    let list = self
      .lists
      .get_with_dedup(&hash, || {
        let client = self.client.clone();
        async move { client.list_invoices(query).await.map(|result| result.data) }
      })
      .await?;

    Ok(filter.apply(list))
  }

  /// Drop every cached value carrying `tag`.
  pub fn revalidate(&self, tag: &str) -> Result<usize> {
    self.client.invalidate(tag)
  }
}
