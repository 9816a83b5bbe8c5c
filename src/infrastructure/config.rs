//! Configuration infrastructure
//!
//! Configuration lives in a single JSON file with four sections:
//! 1. `site`: where the listing lives and how to talk to it
//! 2. `selectors`: CSS selectors for reading the site's markup
//! 3. `sync`: concurrency caps for the two sync stages
//! 4. `storage` / `logging`: local paths and log output
//!
//! Every section has defaults, so a partial file is valid.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::application::sync_pipeline::SyncOptions;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub selectors: SelectorConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Remote site settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheme and host, e.g. `https://example.org`
    pub base_url: String,
    /// Listing page path; `{page}` is replaced with the 1-based page number
    pub listing_path: String,
    /// Entity detail path; `{id}` is replaced with the entity id
    pub entity_path: String,
    /// A response that ends up on this path means the session is gone
    pub login_path: String,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    /// Raw `Cookie` header value carrying the signed-in session
    pub session_cookie: Option<String>,
}

/// CSS selectors used by the site parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Container of the listing; its absence means the page is unparsable
    pub listing_container: String,
    /// One element per entity inside the container
    pub listing_item: String,
    /// Attribute on the item element holding the numeric id
    pub item_id_attribute: String,
    /// Element inside the item holding the display name
    pub item_name: String,
    /// Links of the pagination control
    pub pagination_link: String,
    /// Present on pages that ask the user to sign in
    pub login_marker: String,
    /// Element on the detail page holding the classification
    pub classification: String,
}

/// Sync stage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum listing pages fetched at once
    pub listing_concurrency: usize,
    /// Maximum classification lookups at once
    pub enrichment_concurrency: usize,
}

/// Local storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file; defaults to `<data dir>/listing-sync/records.db`
    pub database_path: Option<PathBuf>,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// Enable JSON formatted file logs
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Log directory; defaults to `<data dir>/listing-sync/logs`
    pub directory: Option<PathBuf>,
    /// Number of log files to keep (older files will be deleted)
    pub max_files: usize,
    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            listing_path: defaults::LISTING_PATH.to_string(),
            entity_path: defaults::ENTITY_PATH.to_string(),
            login_path: defaults::LOGIN_PATH.to_string(),
            user_agent: defaults::USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            session_cookie: None,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_container: defaults::LISTING_CONTAINER.to_string(),
            listing_item: defaults::LISTING_ITEM.to_string(),
            item_id_attribute: defaults::ITEM_ID_ATTRIBUTE.to_string(),
            item_name: defaults::ITEM_NAME.to_string(),
            pagination_link: defaults::PAGINATION_LINK.to_string(),
            login_marker: defaults::LOGIN_MARKER.to_string(),
            classification: defaults::CLASSIFICATION.to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            listing_concurrency: defaults::LISTING_CONCURRENCY,
            enrichment_concurrency: defaults::ENRICHMENT_CONCURRENCY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            directory: None,
            max_files: defaults::LOG_MAX_FILES,
            module_filters: HashMap::from([
                ("sqlx".to_string(), "warn".to_string()),
                ("reqwest".to_string(), "info".to_string()),
                ("hyper".to_string(), "warn".to_string()),
                ("html5ever".to_string(), "warn".to_string()),
            ]),
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            listing_concurrency: config.listing_concurrency.max(1),
            enrichment_concurrency: config.enrichment_concurrency.max(1),
        }
    }
}

impl AppConfig {
    /// Database file, falling back to the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(ConfigManager::get_app_data_dir()?.join("records.db")),
        }
    }

    /// Log directory, falling back to the data directory
    pub fn log_directory(&self) -> Result<PathBuf> {
        match &self.logging.directory {
            Some(path) => Ok(path.clone()),
            None => Ok(ConfigManager::get_app_data_dir()?.join("logs")),
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(data_dir)
    }

    /// Manager for the default config file location
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("config.json");
        Ok(Self { config_path })
    }

    /// Manager for an explicit config file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file, creating default if it doesn't exist.
    ///
    /// A file that no longer parses is kept as `*.json.corrupted` and replaced
    /// with defaults.
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("Configuration file could not be parsed: {}", parse_error);
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;
                info!("Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "listing-sync";

    pub const BASE_URL: &str = "https://example.org";
    pub const LISTING_PATH: &str = "/list?page={page}";
    pub const ENTITY_PATH: &str = "/items/{id}";
    pub const LOGIN_PATH: &str = "/login";
    pub const USER_AGENT: &str = "listing-sync/0.2";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Listing pages fetched concurrently
    pub const LISTING_CONCURRENCY: usize = 5;
    /// Classification lookups run concurrently
    pub const ENRICHMENT_CONCURRENCY: usize = 5;

    pub const LISTING_CONTAINER: &str = "#listing";
    pub const LISTING_ITEM: &str = "#listing .item";
    pub const ITEM_ID_ATTRIBUTE: &str = "data-id";
    pub const ITEM_NAME: &str = ".name";
    pub const PAGINATION_LINK: &str = ".pagination a";
    pub const LOGIN_MARKER: &str = "form#login, form[action*='login']";
    pub const CLASSIFICATION: &str = ".category";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_MAX_FILES: usize = 5;
}

/// URL building helper functions
pub mod utils {
    use super::SiteConfig;
    use crate::domain::entity::EntityId;

    /// Listing page URL for a 1-based page number
    pub fn listing_page_url(site: &SiteConfig, page: u32) -> String {
        resolve_url(
            &site.base_url,
            &site.listing_path.replace("{page}", &page.to_string()),
        )
    }

    /// Detail page URL for an entity
    pub fn entity_url(site: &SiteConfig, id: EntityId) -> String {
        resolve_url(&site.base_url, &site.entity_path.replace("{id}", &id.to_string()))
    }

    /// Resolve a relative URL against the base URL
    pub fn resolve_url(base_url: &str, relative_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if relative_url.starts_with("http://") || relative_url.starts_with("https://") {
            relative_url.to_string()
        } else if relative_url.starts_with('/') {
            format!("{}{}", base, relative_url)
        } else {
            format!("{}/{}", base, relative_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_use_five_way_concurrency() {
        let config = AppConfig::default();
        assert_eq!(config.sync.listing_concurrency, 5);
        assert_eq!(config.sync.enrichment_concurrency, 5);
        assert_eq!(SyncOptions::from(&config.sync), SyncOptions::default());
    }

    #[test]
    fn zero_concurrency_is_raised_to_one() {
        let sync = SyncConfig {
            listing_concurrency: 0,
            enrichment_concurrency: 0,
        };
        let options = SyncOptions::from(&sync);
        assert_eq!(options.listing_concurrency, 1);
        assert_eq!(options.enrichment_concurrency, 1);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "site": { "base_url": "https://tracker.test" } }"#).unwrap();
        assert_eq!(config.site.base_url, "https://tracker.test");
        assert_eq!(config.site.listing_path, defaults::LISTING_PATH);
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn builds_listing_and_entity_urls() {
        let site = SiteConfig {
            base_url: "https://tracker.test/".into(),
            ..SiteConfig::default()
        };
        assert_eq!(
            utils::listing_page_url(&site, 3),
            "https://tracker.test/list?page=3"
        );
        assert_eq!(utils::entity_url(&site, 42), "https://tracker.test/items/42");
        assert_eq!(
            utils::resolve_url("https://a.test", "https://b.test/x"),
            "https://b.test/x"
        );
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

        let config = manager.load_config().await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(manager.config_path().exists());
    }

    #[tokio::test]
    async fn corrupted_file_is_backed_up_and_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let manager = ConfigManager::with_path(&path);
        let config = manager.load_config().await.unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(dir.path().join("config.json.corrupted").exists());
    }

    #[tokio::test]
    async fn saved_config_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.json"));

        let mut config = AppConfig::default();
        config.sync.listing_concurrency = 8;
        manager.save_config(&config).await.unwrap();
        let reloaded = manager.load_config().await.unwrap();
        assert_eq!(reloaded.sync.listing_concurrency, 8);
    }
}
