//! JSON HTTP API over the invoice service.

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
  Json, Router,
};
use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::filter::InvoiceFilter;
use crate::notion::cache::InvoiceListQuery;
use crate::notion::client::{is_page_id, DEFAULT_PAGE_SIZE};
use crate::notion::types::{InvoiceStatus, SortField};
use crate::service::InvoiceService;

/// Query string of the listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status: Option<String>,
  pub date_from: Option<String>,
  pub date_to: Option<String>,
  pub sort: Option<String>,
  pub page_size: Option<String>,
  pub cursor: Option<String>,
}

impl ListParams {
  /// Validate the parameters; empty values count as absent.
  pub fn parse(&self) -> Result<(InvoiceListQuery, InvoiceFilter), String> {
    let status = match non_empty(&self.status) {
      Some(s) if s == "all" => None,
      Some(s) => Some(s.parse::<InvoiceStatus>()?),
      None => None,
    };

    let sort = match non_empty(&self.sort) {
      Some("issue_date") | None => SortField::IssueDate,
      Some("total_amount") => SortField::TotalAmount,
      Some(other) => return Err(format!("unknown sort field '{}'", other)),
    };

    let page_size = match non_empty(&self.page_size) {
      Some(s) => s
        .parse::<u32>()
        .map_err(|_| format!("invalid page_size '{}'", s))?,
      None => DEFAULT_PAGE_SIZE,
    };

    let query = InvoiceListQuery::new(page_size, non_empty(&self.cursor).map(String::from), sort);
    let filter = InvoiceFilter {
      status,
      date_from: parse_date_param("date_from", &self.date_from)?,
      date_to: parse_date_param("date_to", &self.date_to)?,
    };
    Ok((query, filter))
  }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date_param(name: &str, value: &Option<String>) -> Result<Option<NaiveDate>, String> {
  non_empty(value)
    .map(|s| {
      NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("invalid {} '{}'", name, s))
    })
    .transpose()
}

/// Failure body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub success: bool,
  pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RevalidateResponse {
  pub success: bool,
  pub message: String,
  pub removed: usize,
}

fn error_response(status: StatusCode, message: String) -> Response {
  let body = ErrorResponse {
    success: false,
    message,
  };
  (status, Json(body)).into_response()
}

/// Liveness probe
pub async fn health_check() -> &'static str {
  "OK"
}

pub async fn list_invoices(
  State(service): State<Arc<InvoiceService>>,
  Query(params): Query<ListParams>,
) -> Response {
  let (query, filter) = match params.parse() {
    Ok(parsed) => parsed,
    Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
  };

  match service.list_invoices(query, &filter).await {
    Ok(list) => (StatusCode::OK, Json(list)).into_response(),
    Err(e) => {
      error!(error = %e, "listing invoices failed");
      error_response(StatusCode::BAD_GATEWAY, format!("Error: {}", e))
    }
  }
}

pub async fn get_invoice(
  State(service): State<Arc<InvoiceService>>,
  Path(id): Path<String>,
) -> Response {
  if !is_page_id(id.trim()) {
    return error_response(StatusCode::BAD_REQUEST, format!("invalid invoice id '{}'", id));
  }

  match service.get_invoice(&id).await {
    Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
    Err(e) => {
      error!(invoice = %id, error = %e, "fetching invoice failed");
      error_response(StatusCode::BAD_GATEWAY, format!("Error: {}", e))
    }
  }
}

pub async fn revalidate(
  State(service): State<Arc<InvoiceService>>,
  Path(tag): Path<String>,
) -> Response {
  match service.revalidate(&tag) {
    Ok(removed) => {
      info!(tag = %tag, removed, "tag revalidated");
      let body = RevalidateResponse {
        success: true,
        message: format!("Revalidated tag '{}'", tag),
        removed,
      };
      (StatusCode::OK, Json(body)).into_response()
    }
    Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)),
  }
}

pub fn router(service: Arc<InvoiceService>) -> Router {
  let api = Router::new()
    .route("/api/invoices", get(list_invoices))
    .route("/api/invoices/:id", get(get_invoice))
    .route("/api/revalidate/:tag", post(revalidate))
    .with_state(service);

  Router::new().route("/health", get(health_check)).merge(api)
}

/// Serve the API until Ctrl-C
pub async fn serve(service: Arc<InvoiceService>, host: &str, port: u16) -> Result<()> {
  let addr = format!("{}:{}", host, port);
  let listener = tokio::net::TcpListener::bind(&addr)
    .await
    .map_err(|e| eyre!("Failed to bind {}: {}", addr, e))?;
  info!("Listening on {}", addr);

  axum::serve(listener, router(service))
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| eyre!("Server error: {}", e))?;

  info!("Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
