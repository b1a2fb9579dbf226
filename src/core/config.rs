use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_CURRENCY_API_URL: &str =
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1/currencies";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurrencyProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub currency: Option<CurrencyProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: DEFAULT_YAHOO_URL.to_string(),
            }),
            currency: Some(CurrencyProviderConfig {
                base_url: DEFAULT_CURRENCY_API_URL.to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn yahoo_url(&self) -> &str {
        self.yahoo
            .as_ref()
            .map_or(DEFAULT_YAHOO_URL, |p| p.base_url.as_str())
    }

    pub fn currency_url(&self) -> &str {
        self.currency
            .as_ref()
            .map_or(DEFAULT_CURRENCY_API_URL, |p| p.base_url.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Disk,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub quote_ttl_secs: u64,
    pub rates_ttl_secs: u64,
    pub search_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            backend: CacheBackend::Disk,
            quote_ttl_secs: 60 * 60,
            rates_ttl_secs: 60 * 60,
            search_ttl_secs: 4 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }

    pub fn rates_ttl(&self) -> Duration {
        Duration::from_secs(self.rates_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_dedup_window() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub data_path: Option<String>,
    #[serde(default)]
    pub admin_emails: Vec<String>,
    #[serde(default = "default_dedup_window")]
    pub log_dedup_window_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            currency: default_currency(),
            data_path: None,
            admin_emails: Vec::new(),
            log_dedup_window_secs: default_dedup_window(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "folio", "folio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "folio", "folio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.apply_env_overrides();
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Overrides file settings with `FOLIO_DATA_PATH` and `FOLIO_BIND_ADDRESS`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FOLIO_DATA_PATH") {
            debug!("Data path overridden from environment");
            self.data_path = Some(path);
        }
        if let Ok(address) = std::env::var("FOLIO_BIND_ADDRESS") {
            debug!("Bind address overridden from environment");
            self.server.bind_address = address;
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }

    pub fn log_dedup_window(&self) -> Duration {
        Duration::from_secs(self.log_dedup_window_secs)
    }
}
