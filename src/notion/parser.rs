//! Conversion of Notion pages into invoices.
//!
//! Every field has a fallback. The database is a user-editable table, so a
//! missing or malformed property degrades to a default value instead of
//! failing the whole invoice.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::config::{InvoiceProperties, ItemProperties, NotionSchema};

use super::api_types::NotionPage;
use super::types::{Invoice, InvoiceStatus, LineItem};

pub const UNKNOWN_INVOICE_NUMBER: &str = "INV-UNKNOWN";
pub const UNSPECIFIED_CLIENT: &str = "미지정";
pub const MISSING_DESCRIPTION: &str = "항목명 없음";

/// Days an invoice stays valid when the database has no expiry date
pub const DEFAULT_VALIDITY_DAYS: u64 = 7;

/// Build an invoice from its page and the pages of its related items.
pub fn transform_invoice(page: &NotionPage, item_pages: &[NotionPage], schema: &NotionSchema) -> Invoice {
  transform_invoice_at(page, item_pages, schema, today())
}

/// Same as [`transform_invoice`] with an explicit "today" for date fallbacks.
pub fn transform_invoice_at(
  page: &NotionPage,
  item_pages: &[NotionPage],
  schema: &NotionSchema,
  today: NaiveDate,
) -> Invoice {
  let props: &InvoiceProperties = &schema.invoice;

  let items: Vec<LineItem> = item_pages
    .iter()
    .map(|item| transform_item(item, &schema.item))
    .collect();

  let issue_date = normalize_date(date_start(page.property(&props.issue_date)), today);

  let valid_until = match date_start(page.property(&props.valid_until)) {
    Some(start) => normalize_date(Some(start), today),
    None => add_days(issue_date, DEFAULT_VALIDITY_DAYS),
  };

  if valid_until < issue_date {
    warn!(
      page_id = %page.id,
      %issue_date,
      %valid_until,
      "Invoice expires before it was issued"
    );
  }

  let items_total: f64 = items.iter().map(|item| item.amount).sum();

  Invoice {
    id: page.id.clone(),
    invoice_number: first_plain_text(page.property(&props.invoice_number), "title")
      .unwrap_or_else(|| UNKNOWN_INVOICE_NUMBER.to_string()),
    client_name: first_plain_text(page.property(&props.client_name), "rich_text")
      .unwrap_or_else(|| UNSPECIFIED_CLIENT.to_string()),
    issue_date,
    valid_until,
    total_amount: parse_number(number_value(page.property(&props.total_amount)), items_total),
    status: InvoiceStatus::from_label(status_label(page.property(&props.status))),
    items,
  }
}

/// Build a line item from an item page.
pub fn transform_item(page: &NotionPage, props: &ItemProperties) -> LineItem {
  let quantity = parse_number(number_value(page.property(&props.quantity)), 0.0);
  let unit_price = parse_number(number_value(page.property(&props.unit_price)), 0.0);

  LineItem {
    id: page.id.clone(),
    description: first_plain_text(page.property(&props.description), "title")
      .unwrap_or_else(|| MISSING_DESCRIPTION.to_string()),
    quantity,
    unit_price,
    amount: parse_number(number_value(page.property(&props.amount)), quantity * unit_price),
  }
}

/// Ids of the pages referenced by a relation property, in order.
pub fn relation_ids(property: Option<&Value>) -> Vec<String> {
  property
    .and_then(|p| p.get("relation"))
    .and_then(Value::as_array)
    .map(|relations| {
      relations
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str))
        .map(String::from)
        .collect()
    })
    .unwrap_or_default()
}

/// Normalize a date string to a calendar date, falling back to `today`.
pub fn normalize_date(value: Option<&str>, today: NaiveDate) -> NaiveDate {
  value.and_then(parse_date).unwrap_or(today)
}

/// Coerce a JSON number or numeric string to a finite number.
///
/// Null, missing, non-numeric, and non-finite values yield `default`.
pub fn parse_number(value: Option<&Value>, default: f64) -> f64 {
  let parsed = match value {
    Some(Value::Number(n)) => n.as_f64(),
    Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
    _ => None,
  };

  parsed.filter(|n| n.is_finite()).unwrap_or(default)
}

fn today() -> NaiveDate {
  Utc::now().date_naive()
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
  date.checked_add_days(Days::new(days)).unwrap_or(date)
}

/// Parse the date formats Notion and hand-edited values produce.
/// Timestamps with an offset are converted to their UTC date.
fn parse_date(value: &str) -> Option<NaiveDate> {
  let value = value.trim();
  if value.is_empty() {
    return None;
  }

  if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
    return Some(dt.with_timezone(&Utc).date_naive());
  }

  if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
    return Some(date);
  }

  if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
    return Some(dt.date());
  }

  NaiveDate::parse_from_str(value, "%Y/%m/%d").ok()
}

// ============================================================================
// Property accessors
// ============================================================================

/// First non-empty plain text segment of a title or rich_text property
fn first_plain_text(property: Option<&Value>, kind: &str) -> Option<String> {
  property?
    .get(kind)?
    .as_array()?
    .first()?
    .get("plain_text")?
    .as_str()
    .filter(|s| !s.is_empty())
    .map(String::from)
}

/// Start of a date property
fn date_start(property: Option<&Value>) -> Option<&str> {
  property?.get("date")?.get("start")?.as_str()
}

/// Value of a number property, `None` when empty
fn number_value(property: Option<&Value>) -> Option<&Value> {
  property?.get("number").filter(|v| !v.is_null())
}

/// Name of a status property. Select properties are accepted as well.
fn status_label(property: Option<&Value>) -> Option<&str> {
  let property = property?;
  property
    .get("status")
    .and_then(|s| s.get("name"))
    .or_else(|| property.get("select").and_then(|s| s.get("name")))
    .and_then(Value::as_str)
}
