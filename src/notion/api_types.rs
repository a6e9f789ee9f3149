//! Serde-deserializable types matching Notion API responses.
//!
//! Pages keep their properties as a raw JSON property bag. The database is
//! edited by hand, so property shapes are never trusted here; the parser reads
//! them defensively.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Pages
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotionPage {
  pub id: String,
  #[serde(default)]
  pub properties: Map<String, Value>,
}

impl NotionPage {
  pub fn property(&self, name: &str) -> Option<&Value> {
    self.properties.get(name)
  }
}

// ============================================================================
// Database query endpoint
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiQueryRequest<'a> {
  pub page_size: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub start_cursor: Option<&'a str>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub sorts: Vec<ApiSort<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ApiSort<'a> {
  pub property: &'a str,
  pub direction: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ApiQueryResponse {
  #[serde(default)]
  pub results: Vec<NotionPage>,
  #[serde(default)]
  pub has_more: bool,
  pub next_cursor: Option<String>,
}

// ============================================================================
// Database retrieve endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiRichText {
  #[serde(default)]
  pub plain_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPropertySchema {
  #[serde(rename = "type")]
  pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiDatabase {
  pub id: String,
  #[serde(default)]
  pub title: Vec<ApiRichText>,
  #[serde(default)]
  pub properties: std::collections::BTreeMap<String, ApiPropertySchema>,
}

impl ApiDatabase {
  pub fn title(&self) -> String {
    self
      .title
      .iter()
      .map(|t| t.plain_text.as_str())
      .collect::<String>()
  }
}

// ============================================================================
// Errors
// ============================================================================

/// Error body returned by the Notion API on non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ApiError {
  #[serde(default)]
  pub status: u16,
  #[serde(default)]
  pub code: String,
  #[serde(default)]
  pub message: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_query_request_omits_empty_fields() {
    let request = ApiQueryRequest {
      page_size: 10,
      start_cursor: None,
      sorts: Vec::new(),
    };
    assert_eq!(serde_json::to_value(&request).unwrap(), json!({ "page_size": 10 }));
  }

  #[test]
  fn test_query_response_tolerates_missing_fields() {
    let response: ApiQueryResponse = serde_json::from_value(json!({
      "object": "list",
      "results": [{ "id": "page-1", "object": "page" }],
      "next_cursor": null
    }))
    .unwrap();

    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].properties.is_empty());
    assert!(!response.has_more);
    assert!(response.next_cursor.is_none());
  }

  #[test]
  fn test_database_title_joins_segments() {
    let database: ApiDatabase = serde_json::from_value(json!({
      "id": "db-1",
      "title": [{ "plain_text": "견적서" }, { "plain_text": " DB" }],
      "properties": { "상태": { "type": "status", "status": {} } }
    }))
    .unwrap();

    assert_eq!(database.title(), "견적서 DB");
    assert_eq!(database.properties["상태"].kind, "status");
  }
}
