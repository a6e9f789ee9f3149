//! Client for the external PDF rendering endpoint.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::config::PdfConfig;
use crate::format::sanitize_filename;
use crate::notion::types::Invoice;

const RENDER_TIMEOUT_SECS: u64 = 60;

#[derive(Serialize)]
struct RenderRequest<'a> {
  invoice: &'a Invoice,
}

pub struct PdfClient {
  http: reqwest::Client,
  endpoint: Url,
}

impl PdfClient {
  pub fn new(config: &PdfConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(RENDER_TIMEOUT_SECS))
      .user_agent(concat!("notion-invoice/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create PDF client: {}", e))?;

    Ok(Self {
      http,
      endpoint: config.endpoint.clone(),
    })
  }

  /// Render an invoice, returning the PDF bytes
  pub async fn render(&self, invoice: &Invoice) -> Result<Vec<u8>> {
    info!(invoice = %invoice.invoice_number, "rendering PDF");

    let response = self
      .http
      .post(self.endpoint.clone())
      .json(&RenderRequest { invoice })
      .send()
      .await
      .map_err(|e| eyre!("Failed to render PDF: {}", e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(eyre!(
        "Failed to render PDF: {} {}",
        status.as_u16(),
        body.trim()
      ));
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read PDF response: {}", e))?;
    Ok(bytes.to_vec())
  }

  /// Render an invoice into `dir`, returning the written path
  pub async fn export(&self, invoice: &Invoice, dir: &Path) -> Result<PathBuf> {
    let bytes = self.render(invoice).await?;
    let path = dir.join(pdf_file_name(invoice));

    std::fs::write(&path, bytes)
      .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
    info!(path = %path.display(), "PDF written");

    Ok(path)
  }
}

/// File name for an exported invoice
pub fn pdf_file_name(invoice: &Invoice) -> String {
  let stem = sanitize_filename(&invoice.invoice_number);
  if stem.is_empty() {
    format!("{}.pdf", sanitize_filename(&invoice.id))
  } else {
    format!("{}.pdf", stem)
  }
}
