//! Display formatting for amounts, dates, statuses and file names.

use chrono::{Datelike, NaiveDate};

use crate::notion::types::InvoiceStatus;

/// How an amount is decorated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyFormat {
  /// Prefix with `₩`
  pub show_symbol: bool,
  /// Suffix with `원`
  pub show_won: bool,
}

impl Default for CurrencyFormat {
  fn default() -> Self {
    Self {
      show_symbol: true,
      show_won: false,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateStyle {
  /// 2025년 10월 7일
  #[default]
  Long,
  /// 2025. 10. 07.
  Short,
  /// 2025-10-07
  Numeric,
}

/// Format an amount in won with thousands separators and at most two
/// fractional digits.
pub fn format_currency(amount: f64, format: CurrencyFormat) -> String {
  if !amount.is_finite() {
    return if format.show_symbol {
      "₩0".to_string()
    } else {
      "0원".to_string()
    };
  }

  format!(
    "{}{}{}",
    if format.show_symbol { "₩" } else { "" },
    group_thousands(amount),
    if format.show_won { "원" } else { "" }
  )
}

fn group_thousands(amount: f64) -> String {
  let rounded = (amount * 100.0).round() / 100.0;
  let fixed = format!("{:.2}", rounded.abs());
  let (int_part, frac_part) = match fixed.split_once('.') {
    Some((int_part, frac_part)) => (int_part, frac_part.trim_end_matches('0')),
    None => (fixed.as_str(), ""),
  };

  let digits: Vec<char> = int_part.chars().collect();
  let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
  if rounded < 0.0 {
    grouped.push('-');
  }
  for (i, c) in digits.iter().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(*c);
  }
  if !frac_part.is_empty() {
    grouped.push('.');
    grouped.push_str(frac_part);
  }
  grouped
}

pub fn format_date(date: NaiveDate, style: DateStyle) -> String {
  match style {
    DateStyle::Long => format!("{}년 {}월 {}일", date.year(), date.month(), date.day()),
    DateStyle::Short => date.format("%Y. %m. %d.").to_string(),
    DateStyle::Numeric => date.format("%Y-%m-%d").to_string(),
  }
}

pub fn format_invoice_status(status: InvoiceStatus) -> &'static str {
  status.label()
}

/// Turn an invoice number into a file name stem.
///
/// Lowercases, drops punctuation, and collapses runs of whitespace, dots and
/// hyphens into a single hyphen.
pub fn sanitize_filename(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  let mut pending_separator = false;

  for c in name.to_lowercase().chars() {
    if c.is_whitespace() || c == '.' || c == '-' {
      pending_separator = true;
    } else if c.is_alphanumeric() || c == '_' {
      if pending_separator && !out.is_empty() {
        out.push('-');
      }
      pending_separator = false;
      out.push(c);
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
  }

  #[test]
  fn test_format_date_styles() {
    assert_eq!(format_date(date("2025-10-07"), DateStyle::Long), "2025년 10월 7일");
    assert_eq!(format_date(date("2025-01-01"), DateStyle::Long), "2025년 1월 1일");
    assert_eq!(format_date(date("2025-10-07"), DateStyle::Short), "2025. 10. 07.");
    assert_eq!(format_date(date("2025-10-07"), DateStyle::Numeric), "2025-10-07");
  }

  #[test]
  fn test_format_currency_with_symbol() {
    let format = CurrencyFormat::default();
    assert_eq!(format_currency(1_000_000.0, format), "₩1,000,000");
    assert_eq!(format_currency(1_500_000.0, format), "₩1,500,000");
    assert_eq!(format_currency(0.0, format), "₩0");
    assert_eq!(format_currency(999.0, format), "₩999");
  }

  #[test]
  fn test_format_currency_without_symbol() {
    let plain = CurrencyFormat {
      show_symbol: false,
      show_won: false,
    };
    let won = CurrencyFormat {
      show_symbol: false,
      show_won: true,
    };
    assert_eq!(format_currency(1_000_000.0, plain), "1,000,000");
    assert_eq!(format_currency(1_000_000.0, won), "1,000,000원");
  }

  #[test]
  fn test_format_currency_non_finite() {
    let plain = CurrencyFormat {
      show_symbol: false,
      show_won: false,
    };
    assert_eq!(format_currency(f64::NAN, CurrencyFormat::default()), "₩0");
    assert_eq!(format_currency(f64::NAN, plain), "0원");
    assert_eq!(format_currency(f64::INFINITY, CurrencyFormat::default()), "₩0");
  }

  #[test]
  fn test_format_currency_fractions_and_negatives() {
    let format = CurrencyFormat::default();
    assert_eq!(format_currency(1234.56, format), "₩1,234.56");
    assert_eq!(format_currency(1234.5, format), "₩1,234.5");
    assert_eq!(format_currency(0.001, format), "₩0");
    assert_eq!(format_currency(-1000.0, format), "₩-1,000");
    assert_eq!(format_currency(-1_234_567.0, format), "₩-1,234,567");
  }

  #[test]
  fn test_format_invoice_status() {
    assert_eq!(format_invoice_status(InvoiceStatus::Pending), "대기");
    assert_eq!(format_invoice_status(InvoiceStatus::Approved), "승인");
    assert_eq!(format_invoice_status(InvoiceStatus::Rejected), "거절");
  }

  #[test]
  fn test_sanitize_filename() {
    assert_eq!(sanitize_filename("견적서 #001 (2025.10.07)"), "견적서-001-2025-10-07");
    assert_eq!(sanitize_filename("파일   이름   테스트"), "파일-이름-테스트");
    assert_eq!(sanitize_filename("test.file.name"), "test-file-name");
    assert_eq!(sanitize_filename("ABC Test"), "abc-test");
    assert_eq!(sanitize_filename("(test) #123"), "test-123");
    assert_eq!(sanitize_filename("  -INV-2025-001- "), "inv-2025-001");
  }
}
