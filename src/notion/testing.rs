//! In-process fake of the Notion endpoints the client uses.

use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::config::{NotionConfig, NotionSchema};

use super::client::NotionClient;

#[derive(Default)]
struct MockState {
  pages: Mutex<HashMap<String, Value>>,
  query_response: Mutex<Option<Value>>,
  last_query: Mutex<Option<Value>>,
  page_requests: AtomicUsize,
  failing: AtomicBool,
  delay_ms: AtomicU64,
}

pub struct MockNotion {
  state: Arc<MockState>,
  api_url: Url,
}

impl MockNotion {
  pub const DATABASE_ID: &'static str = "db-test";
  pub const TOKEN: &'static str = "test-token";

  pub async fn start() -> Self {
    let state = Arc::new(MockState::default());
    let app = Router::new()
      .route("/v1/pages/:id", get(get_page))
      .route("/v1/databases/:id", get(get_database))
      .route("/v1/databases/:id/query", post(query_database))
      .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });

    Self {
      state,
      api_url: Url::parse(&format!("http://{}/v1/", addr)).unwrap(),
    }
  }

  pub fn notion_config(api_url: Url) -> NotionConfig {
    NotionConfig {
      database_id: Some(Self::DATABASE_ID.to_string()),
      api_url: Some(api_url),
      version: "2022-06-28".to_string(),
      timeout_secs: 5,
      schema: NotionSchema::default(),
    }
  }

  pub fn config(&self) -> NotionConfig {
    Self::notion_config(self.api_url.clone())
  }

  pub fn client(&self) -> NotionClient {
    NotionClient::with_token(&self.config(), Self::TOKEN, Self::DATABASE_ID.to_string()).unwrap()
  }

  pub fn insert_page(&self, id: &str, properties: Value) {
    let page = json!({ "object": "page", "id": id, "properties": properties });
    self.state.pages.lock().unwrap().insert(id.to_string(), page);
  }

  /// Invoice issued 2025-01-15 with no expiry or total, plus its item pages.
  pub fn insert_invoice(&self, id: &str, number: &str, items: &[(&str, u64)]) {
    let relation: Vec<Value> = items.iter().map(|(item_id, _)| json!({ "id": item_id })).collect();
    self.insert_page(
      id,
      json!({
        "견적서번호": { "type": "title", "title": [{ "plain_text": number }] },
        "클라이언트명": { "type": "rich_text", "rich_text": [{ "plain_text": "ABC 회사" }] },
        "발행일": { "type": "date", "date": { "start": "2025-01-15" } },
        "유효기간": { "type": "date", "date": null },
        "총금액": { "type": "number", "number": null },
        "상태": { "type": "status", "status": { "name": "대기" } },
        "항목": { "type": "relation", "relation": relation }
      }),
    );

    for (item_id, amount) in items {
      self.insert_page(
        item_id,
        json!({
          "항목명": { "type": "title", "title": [{ "plain_text": format!("항목 {}", item_id) }] },
          "수량": { "type": "number", "number": 1 },
          "단가": { "type": "number", "number": amount },
          "금액": { "type": "number", "number": amount }
        }),
      );
    }
  }

  pub fn set_query_results(&self, ids: &[&str], has_more: bool, next_cursor: Option<&str>) {
    let pages = self.state.pages.lock().unwrap();
    let results: Vec<Value> = ids.iter().filter_map(|id| pages.get(*id).cloned()).collect();
    *self.state.query_response.lock().unwrap() = Some(json!({
      "object": "list",
      "results": results,
      "has_more": has_more,
      "next_cursor": next_cursor,
    }));
  }

  pub fn last_query(&self) -> Option<Value> {
    self.state.last_query.lock().unwrap().clone()
  }

  pub fn page_requests(&self) -> usize {
    self.state.page_requests.load(Ordering::SeqCst)
  }

  /// Make every page request fail with a 502
  pub fn set_failing(&self, failing: bool) {
    self.state.failing.store(failing, Ordering::SeqCst);
  }

  /// Delay every page response
  pub fn set_delay(&self, delay: Duration) {
    self
      .state
      .delay_ms
      .store(delay.as_millis() as u64, Ordering::SeqCst);
  }
}

fn authorized(headers: &HeaderMap) -> bool {
  let expected = format!("Bearer {}", MockNotion::TOKEN);
  headers
    .get(AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .map(|v| v == expected)
    .unwrap_or(false)
}

fn error(status: StatusCode, code: &str, message: &str) -> (StatusCode, Json<Value>) {
  (
    status,
    Json(json!({
      "object": "error",
      "status": status.as_u16(),
      "code": code,
      "message": message,
    })),
  )
}

async fn get_page(
  State(state): State<Arc<MockState>>,
  Path(id): Path<String>,
  headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
  if !authorized(&headers) {
    return error(StatusCode::UNAUTHORIZED, "unauthorized", "API token is invalid.");
  }
  state.page_requests.fetch_add(1, Ordering::SeqCst);

  let delay = state.delay_ms.load(Ordering::SeqCst);
  if delay > 0 {
    tokio::time::sleep(Duration::from_millis(delay)).await;
  }

  if state.failing.load(Ordering::SeqCst) {
    return error(StatusCode::BAD_GATEWAY, "service_unavailable", "Notion is unavailable.");
  }

  let page = state.pages.lock().unwrap().get(&id).cloned();
  match page {
    Some(page) => (StatusCode::OK, Json(page)),
    None => error(
      StatusCode::NOT_FOUND,
      "object_not_found",
      &format!("Could not find page with ID: {}.", id),
    ),
  }
}

async fn get_database(
  Path(id): Path<String>,
  headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
  if !authorized(&headers) {
    return error(StatusCode::UNAUTHORIZED, "unauthorized", "API token is invalid.");
  }

  (
    StatusCode::OK,
    Json(json!({
      "object": "database",
      "id": id,
      "title": [{ "plain_text": "견적서" }],
      "properties": {
        "견적서번호": { "type": "title", "title": {} },
        "클라이언트명": { "type": "rich_text", "rich_text": {} },
        "발행일": { "type": "date", "date": {} },
        "총 금액": { "type": "number", "number": {} },
        "상태": { "type": "select", "select": {} },
        "항목": { "type": "relation", "relation": {} }
      }
    })),
  )
}

async fn query_database(
  State(state): State<Arc<MockState>>,
  headers: HeaderMap,
  Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
  if !authorized(&headers) {
    return error(StatusCode::UNAUTHORIZED, "unauthorized", "API token is invalid.");
  }
  *state.last_query.lock().unwrap() = Some(body);

  let response = state
    .query_response
    .lock()
    .unwrap()
    .clone()
    .unwrap_or_else(|| json!({ "object": "list", "results": [], "has_more": false, "next_cursor": null }));
  (StatusCode::OK, Json(response))
}
