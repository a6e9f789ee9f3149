use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub notion: NotionConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Public base URL that invoice links are generated from
  pub base_url: Option<Url>,
  pub pdf: Option<PdfConfig>,
  #[serde(default)]
  pub server: ServerConfig,
  /// Default log filter when RUST_LOG is not set (e.g. "info", "notion_invoice=debug")
  pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotionConfig {
  /// Invoice database id; falls back to NOTION_DATABASE_ID
  pub database_id: Option<String>,
  pub api_url: Option<Url>,
  /// Value of the Notion-Version header
  #[serde(default = "default_api_version")]
  pub version: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default)]
  pub schema: NotionSchema,
}

/// Property names of the invoice and item databases
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct NotionSchema {
  #[serde(default)]
  pub invoice: InvoiceProperties,
  #[serde(default)]
  pub item: ItemProperties,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InvoiceProperties {
  pub invoice_number: String,
  pub client_name: String,
  pub issue_date: String,
  pub valid_until: String,
  pub total_amount: String,
  pub status: String,
  pub items: String,
}

impl Default for InvoiceProperties {
  fn default() -> Self {
    Self {
      invoice_number: "견적서번호".to_string(),
      client_name: "클라이언트명".to_string(),
      issue_date: "발행일".to_string(),
      valid_until: "유효기간".to_string(),
      total_amount: "총금액".to_string(),
      status: "상태".to_string(),
      items: "항목".to_string(),
    }
  }
}

impl InvoiceProperties {
  /// Expected (name, type) pairs, used by the database check
  pub fn expected(&self) -> Vec<(&str, &'static str)> {
    vec![
      (self.invoice_number.as_str(), "title"),
      (self.client_name.as_str(), "rich_text"),
      (self.issue_date.as_str(), "date"),
      (self.valid_until.as_str(), "date"),
      (self.total_amount.as_str(), "number"),
      (self.status.as_str(), "status"),
      (self.items.as_str(), "relation"),
    ]
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ItemProperties {
  pub description: String,
  pub quantity: String,
  pub unit_price: String,
  pub amount: String,
}

impl Default for ItemProperties {
  fn default() -> Self {
    Self {
      description: "항목명".to_string(),
      quantity: "수량".to_string(),
      unit_price: "단가".to_string(),
      amount: "금액".to_string(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// In-process cache, lost on exit
  #[default]
  Memory,
  /// SQLite file in the data directory, shared between processes
  Sqlite,
  /// Caching disabled
  None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend: CacheBackend,
  /// Override for the SQLite cache location
  pub path: Option<PathBuf>,
  pub invoice_revalidate_secs: u64,
  pub invoice_list_revalidate_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::default(),
      path: None,
      invoice_revalidate_secs: 300,
      invoice_list_revalidate_secs: 120,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdfConfig {
  pub endpoint: Url,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: "127.0.0.1".to_string(),
      port: 3000,
    }
  }
}

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_API_URL: &str = "https://api.notion.com/v1/";

fn url_or_default(url: &Option<Url>, default: &str) -> Result<Url> {
  match url {
    Some(url) => Ok(url.clone()),
    None => Url::parse(default).map_err(|e| eyre!("Failed to parse default URL {}: {}", default, e)),
  }
}

impl NotionConfig {
  /// Notion API base, `https://api.notion.com/v1/` unless configured
  pub fn api_url(&self) -> Result<Url> {
    url_or_default(&self.api_url, DEFAULT_API_URL)
  }
}

fn default_api_version() -> String {
  "2022-06-28".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

impl Config {
  /// Base of the shareable invoice links, `http://localhost:3000` unless configured
  pub fn base_url(&self) -> Result<Url> {
    url_or_default(&self.base_url, DEFAULT_BASE_URL)
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./notion-invoice.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/notion-invoice/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/notion-invoice/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("notion-invoice.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("notion-invoice").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the Notion integration token from environment variables.
  ///
  /// Checks NOTION_INVOICE_TOKEN first, then NOTION_API_KEY as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("NOTION_INVOICE_TOKEN")
      .or_else(|_| std::env::var("NOTION_API_KEY"))
      .map_err(|_| {
        eyre!(
          "Notion token not found. Set NOTION_INVOICE_TOKEN or NOTION_API_KEY environment variable."
        )
      })
  }

  /// Invoice database id from the config file or NOTION_DATABASE_ID.
  pub fn database_id(&self) -> Result<String> {
    if let Some(id) = self.notion.database_id.as_deref().filter(|id| !id.is_empty()) {
      return Ok(id.to_string());
    }
    std::env::var("NOTION_DATABASE_ID").map_err(|_| {
      eyre!("Notion database id not set. Add notion.database_id or set NOTION_DATABASE_ID.")
    })
  }

  /// Directory for the SQLite cache and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("notion-invoice"))
  }
}
