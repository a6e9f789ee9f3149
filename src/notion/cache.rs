//! Caching implementations for invoice types.

use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::cache::{CachePolicy, Cacheable, QueryKey};
use crate::config::CacheConfig;

use super::client::{clamp_page_size, DEFAULT_PAGE_SIZE};
use super::types::{Invoice, InvoiceList, SortField};

/// Tag carried by every cached single invoice
pub const INVOICE_TAG: &str = "invoice";

/// Tag carried by every cached invoice listing
pub const INVOICE_LIST_TAG: &str = "invoice-list";

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Invoice {
  fn entity_type() -> &'static str {
    "invoice"
  }
}

impl Cacheable for InvoiceList {
  fn entity_type() -> &'static str {
    "invoice_list"
  }
}

// ============================================================================
// Policies
// ============================================================================

/// Single invoices, refreshed every 5 minutes by default
pub fn invoice_policy(config: &CacheConfig) -> CachePolicy {
  CachePolicy::new(
    "invoice",
    Duration::from_secs(config.invoice_revalidate_secs),
    &[INVOICE_TAG],
  )
}

/// Invoice listings, refreshed every 2 minutes by default
pub fn invoice_list_policy(config: &CacheConfig) -> CachePolicy {
  CachePolicy::new(
    "invoice-list",
    Duration::from_secs(config.invoice_list_revalidate_secs),
    &[INVOICE_LIST_TAG],
  )
}

// ============================================================================
// Query key types
// ============================================================================

/// Lookup of a single invoice page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceKey {
  pub page_id: String,
}

impl InvoiceKey {
  pub fn new(page_id: &str) -> Self {
    Self {
      page_id: page_id.trim().to_string(),
    }
  }
}

/// One page of the invoice listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceListQuery {
  pub page_size: u32,
  pub start_cursor: Option<String>,
  pub sort: SortField,
}

impl InvoiceListQuery {
  /// Build a query; the page size is clamped so equal Notion requests share a key
  pub fn new(page_size: u32, start_cursor: Option<String>, sort: SortField) -> Self {
    Self {
      page_size: clamp_page_size(page_size),
      start_cursor,
      sort,
    }
  }
}

impl Default for InvoiceListQuery {
  fn default() -> Self {
    Self {
      page_size: DEFAULT_PAGE_SIZE,
      start_cursor: None,
      sort: SortField::default(),
    }
  }
}

impl QueryKey for InvoiceKey {
  fn cache_hash(&self) -> String {
    sha256_hex(&format!("invoice:{}", normalize_page_id(&self.page_id)))
  }

  fn description(&self) -> String {
    format!("invoice {}", self.page_id)
  }
}

impl QueryKey for InvoiceListQuery {
  fn cache_hash(&self) -> String {
    sha256_hex(&format!(
      "invoice_list:{}:{}:{}",
      self.page_size,
      self.start_cursor.as_deref().unwrap_or(""),
      self.sort.as_str()
    ))
  }

  fn description(&self) -> String {
    match &self.start_cursor {
      Some(cursor) => format!(
        "{} invoices by {} from {}",
        self.page_size,
        self.sort.as_str(),
        cursor
      ),
      None => format!("first {} invoices by {}", self.page_size, self.sort.as_str()),
    }
  }
}

/// SHA256 hash for stable, fixed-length keys
fn sha256_hex(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}

/// Notion accepts page ids with or without dashes; cache them one way.
fn normalize_page_id(page_id: &str) -> String {
  page_id.replace('-', "").to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_page_id_spellings_share_a_key() {
    let dashed = InvoiceKey::new("1A2B3C4D-0000-1111-2222-333344445555");
    let plain = InvoiceKey::new("1a2b3c4d000011112222333344445555");
    assert_eq!(dashed.cache_hash(), plain.cache_hash());
    assert_eq!(dashed.cache_hash().len(), 64);
  }

  #[test]
  fn test_list_queries_differ_by_every_field() {
    let base = InvoiceListQuery::default();
    let other_size = InvoiceListQuery {
      page_size: 20,
      ..base.clone()
    };
    let other_cursor = InvoiceListQuery {
      start_cursor: Some("abc".to_string()),
      ..base.clone()
    };
    let other_sort = InvoiceListQuery {
      sort: SortField::TotalAmount,
      ..base.clone()
    };

    let hashes = [
      base.cache_hash(),
      other_size.cache_hash(),
      other_cursor.cache_hash(),
      other_sort.cache_hash(),
    ];
    for (i, a) in hashes.iter().enumerate() {
      for b in &hashes[i + 1..] {
        assert_ne!(a, b);
      }
    }
  }

  #[test]
  fn test_out_of_range_page_sizes_share_a_key() {
    let query = |size| InvoiceListQuery::new(size, None, SortField::IssueDate);

    assert_eq!(query(0).cache_hash(), query(1).cache_hash());
    assert_eq!(query(500).cache_hash(), query(100).cache_hash());
    assert_ne!(query(1).cache_hash(), query(100).cache_hash());
    assert_eq!(query(500).page_size, 100);
  }

  #[test]
  fn test_policies_follow_config() {
    let config = CacheConfig::default();
    let invoice = invoice_policy(&config);
    let list = invoice_list_policy(&config);

    assert_eq!(invoice.revalidate, Duration::from_secs(300));
    assert_eq!(invoice.tags, vec![INVOICE_TAG.to_string()]);
    assert_eq!(list.revalidate, Duration::from_secs(120));
    assert_eq!(list.tags, vec![INVOICE_LIST_TAG.to_string()]);
  }

  #[test]
  fn test_descriptions() {
    assert_eq!(InvoiceKey::new("abc").description(), "invoice abc");
    assert_eq!(
      InvoiceListQuery::default().description(),
      "first 10 invoices by issue_date"
    );
  }
}
