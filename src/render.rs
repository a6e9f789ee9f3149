//! Plain-text rendering of invoices for the terminal.

use std::fmt::Write;
use url::Url;

use crate::filter::InvoiceFilter;
use crate::format::{format_currency, format_date, format_invoice_status, CurrencyFormat, DateStyle};
use crate::links::{generate_invoice_url, generate_short_url};
use crate::notion::types::{Invoice, InvoiceList};

const NUMBER_WIDTH: usize = 16;
const CLIENT_WIDTH: usize = 20;
const DATE_WIDTH: usize = 14;
const AMOUNT_WIDTH: usize = 16;
const STATUS_WIDTH: usize = 6;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

fn pad(s: &str, width: usize) -> String {
  let s = truncate(s, width);
  let fill = width.saturating_sub(s.chars().count());
  format!("{}{}", s, " ".repeat(fill))
}

fn pad_left(s: &str, width: usize) -> String {
  let fill = width.saturating_sub(s.chars().count());
  format!("{}{}", " ".repeat(fill), s)
}

/// Full invoice document with its line items
pub fn invoice_detail(invoice: &Invoice, base_url: &Url) -> String {
  let currency = CurrencyFormat::default();
  let mut out = String::new();

  let _ = writeln!(out, "견적서 {}", invoice.invoice_number);
  let _ = writeln!(out, "클라이언트: {}", invoice.client_name);
  let _ = writeln!(
    out,
    "발행일: {}",
    format_date(invoice.issue_date, DateStyle::Long)
  );
  let _ = writeln!(
    out,
    "유효기간: {}",
    format_date(invoice.valid_until, DateStyle::Long)
  );
  let _ = writeln!(out, "상태: {}", format_invoice_status(invoice.status));
  let _ = writeln!(out, "링크: {}", generate_invoice_url(base_url, &invoice.id));
  let _ = writeln!(out);

  if invoice.items.is_empty() {
    let _ = writeln!(out, "(항목 없음)");
  } else {
    let _ = writeln!(
      out,
      "{} {} {} {}",
      pad("항목", 30),
      pad_left("수량", 8),
      pad_left("단가", AMOUNT_WIDTH),
      pad_left("금액", AMOUNT_WIDTH)
    );
    for item in &invoice.items {
      let _ = writeln!(
        out,
        "{} {} {} {}",
        pad(&item.description, 30),
        pad_left(&item.quantity.to_string(), 8),
        pad_left(&format_currency(item.unit_price, currency), AMOUNT_WIDTH),
        pad_left(&format_currency(item.amount, currency), AMOUNT_WIDTH)
      );
    }
  }

  let _ = writeln!(out);
  let _ = writeln!(
    out,
    "총 금액: {}",
    format_currency(invoice.total_amount, currency)
  );
  out
}

/// Admin listing table
pub fn invoice_table(list: &InvoiceList, filter: &InvoiceFilter) -> String {
  let mut out = String::new();

  let _ = writeln!(
    out,
    "{} {} {} {} {} {} 링크",
    pad("견적서 번호", NUMBER_WIDTH),
    pad("클라이언트명", CLIENT_WIDTH),
    pad("발행일", DATE_WIDTH),
    pad("유효기간", DATE_WIDTH),
    pad_left("총액", AMOUNT_WIDTH),
    pad("상태", STATUS_WIDTH),
  );

  for invoice in &list.invoices {
    let _ = writeln!(
      out,
      "{} {} {} {} {} {} {}",
      pad(&invoice.invoice_number, NUMBER_WIDTH),
      pad(&invoice.client_name, CLIENT_WIDTH),
      pad(&format_date(invoice.issue_date, DateStyle::Short), DATE_WIDTH),
      pad(&format_date(invoice.valid_until, DateStyle::Short), DATE_WIDTH),
      pad_left(
        &format_currency(invoice.total_amount, CurrencyFormat::default()),
        AMOUNT_WIDTH
      ),
      pad(format_invoice_status(invoice.status), STATUS_WIDTH),
      generate_short_url(&invoice.id),
    );
  }

  let _ = writeln!(out);
  let mut summary = format!("견적서 {}개", list.invoices.len());
  if filter.active_count() > 0 {
    summary.push_str(&format!(" (필터 {}개 적용됨)", filter.active_count()));
  }
  if let Some(cursor) = list.next_cursor.as_deref().filter(|_| list.has_more) {
    summary.push_str(&format!(" | 다음 페이지: --cursor {}", cursor));
  }
  let _ = writeln!(out, "{}", summary);
  out
}
