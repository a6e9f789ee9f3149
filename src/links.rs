//! Shareable invoice links.

use url::Url;

/// Characters of the invoice id kept in a short link
const SHORT_ID_LEN: usize = 8;

/// Public URL of an invoice page under `base`
pub fn generate_invoice_url(base: &Url, invoice_id: &str) -> String {
  format!(
    "{}/invoice/{}",
    base.as_str().trim_end_matches('/'),
    invoice_id
  )
}

/// Abbreviated link text for tables
pub fn generate_short_url(invoice_id: &str) -> String {
  let short: String = invoice_id.chars().take(SHORT_ID_LEN).collect();
  format!("...{}", short)
}
