use crate::config::{Config, NotionConfig, NotionSchema};
use crate::notion::api_types::{
  ApiDatabase, ApiError, ApiQueryRequest, ApiQueryResponse, ApiSort, NotionPage,
};
use crate::notion::parser::{relation_ids, transform_invoice};
use crate::notion::types::{Invoice, InvoiceList, SortField};
use color_eyre::{eyre::eyre, Report, Result};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Page size used when the caller doesn't ask for one
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page the Notion API returns
pub const MAX_PAGE_SIZE: u32 = 100;

/// Clamp a requested page size to what the Notion API accepts
pub fn clamp_page_size(page_size: u32) -> u32 {
  page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Notion page ids are hex with optional dashes; anything else would change
/// the request path
pub fn is_page_id(page_id: &str) -> bool {
  !page_id.is_empty() && page_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Item pages fetched at the same time
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Notion API client wrapper
#[derive(Clone)]
pub struct NotionClient {
  http: reqwest::Client,
  api_url: Url,
  database_id: String,
  schema: Arc<NotionSchema>,
}

impl NotionClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;
    let database_id = config.database_id()?;

    Self::with_token(&config.notion, &token, database_id)
  }

  pub fn with_token(notion: &NotionConfig, token: &str, database_id: String) -> Result<Self> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|e| eyre!("Invalid Notion token: {}", e))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(
      "Notion-Version",
      HeaderValue::from_str(&notion.version)
        .map_err(|e| eyre!("Invalid Notion API version '{}': {}", notion.version, e))?,
    );

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(notion.timeout_secs))
      .user_agent(concat!("notion-invoice/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create Notion client: {}", e))?;

    // Url::join replaces the last path segment unless the base ends with '/'
    let mut api_url = notion.api_url()?;
    if !api_url.path().ends_with('/') {
      let path = format!("{}/", api_url.path());
      api_url.set_path(&path);
    }

    Ok(Self {
      http,
      api_url,
      database_id,
      schema: Arc::new(notion.schema.clone()),
    })
  }

  pub fn schema(&self) -> &NotionSchema {
    &self.schema
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .api_url
      .join(path)
      .map_err(|e| eyre!("Invalid Notion endpoint {}: {}", path, e))
  }

  fn page_endpoint(&self, page_id: &str) -> Result<Url> {
    if !is_page_id(page_id) {
      return Err(eyre!("Invalid page id '{}'", page_id));
    }
    let mut url = self.endpoint("pages/")?;
    url
      .path_segments_mut()
      .map_err(|_| eyre!("Invalid Notion endpoint {}", self.api_url))?
      .pop_if_empty()
      .push(page_id);
    Ok(url)
  }

  /// Send a request and decode the JSON body, turning Notion error bodies into errors
  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Failed to {}: {}", what, e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(api_error(status, &body, what));
    }

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response to {}: {}", what, e))
  }

  /// Retrieve a single page with its properties
  pub async fn retrieve_page(&self, page_id: &str) -> Result<NotionPage> {
    let url = self.page_endpoint(page_id)?;
    debug!(page_id, "retrieving page");

    self
      .send(self.http.get(url), &format!("get page {}", page_id))
      .await
  }

  /// Query one page of the invoice database, newest first by `sort`
  pub async fn query_database(
    &self,
    page_size: u32,
    start_cursor: Option<&str>,
    sort: SortField,
  ) -> Result<ApiQueryResponse> {
    let url = self.endpoint(&format!("databases/{}/query", self.database_id))?;
    let property = match sort {
      SortField::IssueDate => self.schema.invoice.issue_date.as_str(),
      SortField::TotalAmount => self.schema.invoice.total_amount.as_str(),
    };
    let body = ApiQueryRequest {
      page_size: clamp_page_size(page_size),
      start_cursor,
      sorts: vec![ApiSort {
        property,
        direction: "descending",
      }],
    };

    self
      .send(self.http.post(url).json(&body), "query invoice database")
      .await
  }

  /// Retrieve the invoice database schema
  pub async fn retrieve_database(&self) -> Result<ApiDatabase> {
    let url = self.endpoint(&format!("databases/{}", self.database_id))?;

    self
      .send(self.http.get(url), "get invoice database")
      .await
  }

  /// Get a single invoice with its line items
  pub async fn get_invoice(&self, page_id: &str) -> Result<Invoice> {
    info!(page_id, "fetching invoice from Notion");
    let page = self.retrieve_page(page_id).await?;
    let items = self.item_pages(&page).await?;

    Ok(transform_invoice(&page, &items, &self.schema))
  }

  /// Get one page of invoices, each with its line items
  pub async fn list_invoices(
    &self,
    page_size: u32,
    start_cursor: Option<&str>,
    sort: SortField,
  ) -> Result<InvoiceList> {
    info!(page_size, sort = sort.as_str(), "listing invoices from Notion");
    let response = self.query_database(page_size, start_cursor, sort).await?;

    let invoices: Vec<Invoice> = futures::stream::iter(response.results)
      .map(|page| async move {
        let items = self.item_pages(&page).await?;
        Ok::<_, Report>(transform_invoice(&page, &items, &self.schema))
      })
      .buffered(MAX_CONCURRENT_REQUESTS)
      .try_collect()
      .await?;

    Ok(InvoiceList {
      invoices,
      has_more: response.has_more,
      next_cursor: response.next_cursor,
    })
  }

  /// Pages referenced by an invoice's item relation, in relation order
  async fn item_pages(&self, invoice: &NotionPage) -> Result<Vec<NotionPage>> {
    let ids = relation_ids(invoice.property(&self.schema.invoice.items));

    futures::stream::iter(ids)
      .map(|id| async move { self.retrieve_page(&id).await })
      .buffered(MAX_CONCURRENT_REQUESTS)
      .try_collect()
      .await
  }
}

fn api_error(status: StatusCode, body: &str, what: &str) -> Report {
  match serde_json::from_str::<ApiError>(body) {
    Ok(err) if !err.message.is_empty() => eyre!(
      "Failed to {}: Notion API error {} ({}): {}",
      what,
      if err.status != 0 { err.status } else { status.as_u16() },
      err.code,
      err.message
    ),
    _ => eyre!(
      "Failed to {}: Notion API error {}: {}",
      what,
      status.as_u16(),
      body.trim()
    ),
  }
}
