use chrono::NaiveDate;

use crate::notion::types::{Invoice, InvoiceList, InvoiceStatus};

/// Admin listing filter, applied to a fetched page of invoices.
///
/// Date bounds are inclusive and compare against the issue date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
  pub status: Option<InvoiceStatus>,
  pub date_from: Option<NaiveDate>,
  pub date_to: Option<NaiveDate>,
}

impl InvoiceFilter {
  pub fn matches(&self, invoice: &Invoice) -> bool {
    if self.status.is_some_and(|status| invoice.status != status) {
      return false;
    }
    if self.date_from.is_some_and(|from| invoice.issue_date < from) {
      return false;
    }
    if self.date_to.is_some_and(|to| invoice.issue_date > to) {
      return false;
    }
    true
  }

  /// Keep matching invoices; pagination fields are left as fetched.
  pub fn apply(&self, mut list: InvoiceList) -> InvoiceList {
    if self.active_count() > 0 {
      list.invoices.retain(|invoice| self.matches(invoice));
    }
    list
  }

  /// Number of criteria in use
  pub fn active_count(&self) -> usize {
    [
      self.status.is_some(),
      self.date_from.is_some(),
      self.date_to.is_some(),
    ]
    .into_iter()
    .filter(|active| *active)
    .count()
  }
}
