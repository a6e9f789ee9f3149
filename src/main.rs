mod cache;
mod check;
mod config;
mod filter;
mod format;
mod links;
mod logging;
mod notion;
mod pdf;
mod render;
mod server;
mod service;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheLayer, Storage};
use crate::config::{CacheBackend, Config};
use crate::filter::InvoiceFilter;
use crate::logging::LogTarget;
use crate::notion::cache::InvoiceListQuery;
use crate::notion::client::{NotionClient, DEFAULT_PAGE_SIZE};
use crate::notion::types::{InvoiceStatus, SortField};
use crate::pdf::PdfClient;
use crate::service::InvoiceService;

#[derive(Parser, Debug)]
#[command(name = "notion-invoice")]
#[command(about = "Invoices and quotes served from a Notion database")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/notion-invoice/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show one invoice
  Show {
    /// Notion page id of the invoice
    id: String,
    /// Print JSON instead of a document
    #[arg(long)]
    json: bool,
  },
  /// List invoices
  List {
    /// pending, approved or rejected
    #[arg(long)]
    status: Option<InvoiceStatus>,
    /// Earliest issue date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Latest issue date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    #[arg(long, value_enum, default_value_t = SortField::IssueDate)]
    sort: SortField,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
    /// Cursor printed by the previous page
    #[arg(long)]
    cursor: Option<String>,
    #[arg(long)]
    json: bool,
  },
  /// Render an invoice to PDF
  Export {
    id: String,
    /// Output directory
    #[arg(long, default_value = ".")]
    out: PathBuf,
  },
  /// Compare the Notion database with the configured properties
  Check,
  /// Drop cached values carrying a tag (invoice, invoice-list)
  Revalidate {
    #[arg(required_unless_present = "all")]
    tag: Option<String>,
    /// Drop every cached value
    #[arg(long, conflicts_with = "tag")]
    all: bool,
  },
  /// Serve the JSON API
  Serve {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Keep stdout for command output; the server logs to stdout
  let log_dir = Config::data_dir()?;
  let target = match args.command {
    Command::Serve { .. } => LogTarget::Stdout,
    _ => LogTarget::File(&log_dir),
  };
  let _guard = logging::init(target, config.log_level.as_deref())?;

  match args.command {
    Command::Show { id, json } => {
      let service = InvoiceService::new(&config)?;
      let invoice = service.get_invoice(&id).await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&invoice)?);
      } else {
        print!("{}", render::invoice_detail(&invoice, &config.base_url()?));
      }
    }
    Command::List {
      status,
      from,
      to,
      sort,
      page_size,
      cursor,
      json,
    } => {
      let service = InvoiceService::new(&config)?;
      let query = InvoiceListQuery::new(page_size, cursor, sort);
      let filter = InvoiceFilter {
        status,
        date_from: from,
        date_to: to,
      };
      let list = service.list_invoices(query, &filter).await?;
      if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
      } else {
        print!("{}", render::invoice_table(&list, &filter));
      }
    }
    Command::Export { id, out } => {
      let pdf = config
        .pdf
        .as_ref()
        .ok_or_else(|| eyre!("PDF export is not configured. Add pdf.endpoint to the config file."))?;
      let service = InvoiceService::new(&config)?;
      let invoice = service.get_invoice(&id).await?;
      let path = PdfClient::new(pdf)?.export(&invoice, &out).await?;
      println!("{}", path.display());
    }
    Command::Check => {
      let client = NotionClient::new(&config)?;
      let report = check::check_database(&client).await?;
      print!("{}", check::render_report(&report));
      if !report.is_healthy() {
        return Err(eyre!(
          "Database properties don't match the configuration. Update notion.schema in the config file."
        ));
      }
    }
    Command::Revalidate { tag, all } => {
      if config.cache.backend == CacheBackend::Memory {
        warn!("memory cache lives in the serving process; use POST /api/revalidate/{{tag}}");
      }
      let cache = CacheLayer::new(Storage::from_config(&config.cache)?);
      match tag {
        Some(tag) if !all => {
          let removed = cache.invalidate(&tag)?;
          info!(tag = %tag, removed, "tag revalidated");
          println!("Removed {} cached entries tagged '{}'", removed, tag);
        }
        _ => {
          cache.clear()?;
          info!("cache cleared");
          println!("Cache cleared");
        }
      }
    }
    Command::Serve { host, port } => {
      let service = Arc::new(InvoiceService::new(&config)?);
      let host = host.unwrap_or_else(|| config.server.host.clone());
      let port = port.unwrap_or(config.server.port);
      server::serve(service, &host, port).await?;
    }
  }

  Ok(())
}
