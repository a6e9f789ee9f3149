//! Diagnostic for the configured Notion database.

use color_eyre::Result;
use std::fmt::Write;
use tracing::{info, warn};

use crate::format::{format_date, DateStyle};
use crate::notion::client::NotionClient;
use crate::notion::parser::transform_invoice;
use crate::notion::types::{Invoice, SortField};

const SAMPLE_SIZE: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyState {
  Ok,
  Missing,
  WrongType(String),
}

#[derive(Debug, Clone)]
pub struct PropertyCheck {
  pub name: String,
  pub expected: &'static str,
  pub state: PropertyState,
}

#[derive(Debug)]
pub struct DatabaseReport {
  pub id: String,
  pub title: String,
  /// Every property in the database with its type
  pub properties: Vec<(String, String)>,
  pub checks: Vec<PropertyCheck>,
  pub samples: Vec<Invoice>,
  pub sample_error: Option<String>,
}

impl DatabaseReport {
  pub fn is_healthy(&self) -> bool {
    self.checks.iter().all(|c| c.state == PropertyState::Ok)
  }
}

/// Retrieve the database and compare its properties with the configured names
pub async fn check_database(client: &NotionClient) -> Result<DatabaseReport> {
  let database = client.retrieve_database().await?;
  info!(database = %database.id, "retrieved invoice database");

  let checks = client
    .schema()
    .invoice
    .expected()
    .into_iter()
    .map(|(name, expected)| {
      let state = match database.properties.get(name) {
        None => PropertyState::Missing,
        Some(prop) if type_matches(expected, &prop.kind) => PropertyState::Ok,
        Some(prop) => PropertyState::WrongType(prop.kind.clone()),
      };
      PropertyCheck {
        name: name.to_string(),
        expected,
        state,
      }
    })
    .collect();

  // Samples are shown without line items; a failed query doesn't fail the check
  let (samples, sample_error) = match client
    .query_database(SAMPLE_SIZE, None, SortField::IssueDate)
    .await
  {
    Ok(response) => (
      response
        .results
        .iter()
        .map(|page| transform_invoice(page, &[], client.schema()))
        .collect(),
      None,
    ),
    Err(e) => {
      warn!(error = %e, "sample query failed");
      (Vec::new(), Some(e.to_string()))
    }
  };

  Ok(DatabaseReport {
    title: database.title(),
    properties: database
      .properties
      .iter()
      .map(|(name, prop)| (name.clone(), prop.kind.clone()))
      .collect(),
    id: database.id,
    checks,
    samples,
    sample_error,
  })
}

/// Status properties may also be plain selects
fn type_matches(expected: &str, actual: &str) -> bool {
  expected == actual || (expected == "status" && actual == "select")
}

pub fn render_report(report: &DatabaseReport) -> String {
  let mut out = String::new();
  let rule = "─".repeat(50);

  let _ = writeln!(out, "Database: {} ({})", report.title, report.id);
  let _ = writeln!(out);
  let _ = writeln!(out, "Properties:");
  let _ = writeln!(out, "{}", rule);
  if report.properties.is_empty() {
    let _ = writeln!(out, "  (none)");
  }
  for (name, kind) in &report.properties {
    let _ = writeln!(out, "  • {} ({})", name, kind);
  }
  let _ = writeln!(out, "{}", rule);
  let _ = writeln!(out);

  let _ = writeln!(out, "Configured properties:");
  for check in &report.checks {
    let line = match &check.state {
      PropertyState::Ok => format!("  ✅ {} ({})", check.name, check.expected),
      PropertyState::Missing => format!("  ❌ {} (missing, expected {})", check.name, check.expected),
      PropertyState::WrongType(actual) => format!(
        "  ❌ {} (is {}, expected {})",
        check.name, actual, check.expected
      ),
    };
    let _ = writeln!(out, "{}", line);
  }
  let _ = writeln!(out);

  let _ = writeln!(out, "Sample invoices:");
  match &report.sample_error {
    Some(error) => {
      let _ = writeln!(out, "  ❌ {}", error);
    }
    None if report.samples.is_empty() => {
      let _ = writeln!(out, "  (database is empty)");
    }
    None => {
      for invoice in &report.samples {
        let _ = writeln!(
          out,
          "  • {} | {} | {} | {}",
          invoice.id,
          invoice.invoice_number,
          invoice.client_name,
          format_date(invoice.issue_date, DateStyle::Numeric)
        );
      }
    }
  }
  out
}
