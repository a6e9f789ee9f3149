use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Invoice (quote) as shown to clients and in the admin listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
  pub id: String,
  pub invoice_number: String,
  pub client_name: String,
  pub issue_date: NaiveDate,
  pub valid_until: NaiveDate,
  pub total_amount: f64,
  pub status: InvoiceStatus,
  pub items: Vec<LineItem>,
}

/// Single line of an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
  pub id: String,
  pub description: String,
  pub quantity: f64,
  pub unit_price: f64,
  pub amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

impl InvoiceStatus {
  pub const ALL: [InvoiceStatus; 3] = [
    InvoiceStatus::Pending,
    InvoiceStatus::Approved,
    InvoiceStatus::Rejected,
  ];

  /// Map a status label from the database to a status.
  /// Missing or unknown labels are treated as pending.
  pub fn from_label(label: Option<&str>) -> Self {
    match label.map(str::trim) {
      Some("승인") => InvoiceStatus::Approved,
      Some("거절") => InvoiceStatus::Rejected,
      _ => InvoiceStatus::Pending,
    }
  }

  /// Label used in the database and in rendered documents
  pub fn label(&self) -> &'static str {
    match self {
      InvoiceStatus::Pending => "대기",
      InvoiceStatus::Approved => "승인",
      InvoiceStatus::Rejected => "거절",
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      InvoiceStatus::Pending => "pending",
      InvoiceStatus::Approved => "approved",
      InvoiceStatus::Rejected => "rejected",
    }
  }
}

impl std::str::FromStr for InvoiceStatus {
  type Err = String;

  /// Parse the English identifier (`pending`, `approved`, `rejected`)
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    InvoiceStatus::ALL
      .into_iter()
      .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| format!("unknown invoice status '{}'", s))
  }
}

/// One page of invoices from the database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceList {
  pub invoices: Vec<Invoice>,
  pub has_more: bool,
  pub next_cursor: Option<String>,
}

/// Field the invoice listing is sorted by (always descending)
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SortField {
  #[default]
  IssueDate,
  TotalAmount,
}

impl SortField {
  pub fn as_str(&self) -> &'static str {
    match self {
      SortField::IssueDate => "issue_date",
      SortField::TotalAmount => "total_amount",
    }
  }
}
