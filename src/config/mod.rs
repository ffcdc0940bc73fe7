//! Configuration management for lotwatch using the prefer crate.

mod loader;
mod settings;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use loader::{load_settings_with_options, LoadOptions};
pub use settings::{ArchiveSettings, Settings};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "lotwatch.db";

/// Marketplace origin used when neither the config file nor
/// `LOTWATCH_BASE_URL` names one.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/";

/// Default image-archive price threshold for value-gated categories.
pub const DEFAULT_PRICE_THRESHOLD: f64 = 1000.0;

/// Local archive subdirectory under the data dir.
const ARCHIVES_SUBDIR: &str = "archives";

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target")]
    pub data_dir: Option<String>,
    /// Database filename or URL.
    /// A plain filename is joined with data_dir; `sqlite:` URLs are used as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Marketplace origin, e.g. "https://market.local/".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// User agent string, or "impersonate".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "SessionConfig::is_default")]
    #[prefer(default)]
    pub session: SessionConfig,
    #[serde(default, skip_serializing_if = "CrawlConfig::is_default")]
    #[prefer(default)]
    pub crawl: CrawlConfig,
    #[serde(default, skip_serializing_if = "ArchiveConfig::is_default")]
    #[prefer(default)]
    pub archive: ArchiveConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

/// Retry and pagination knobs for the marketplace session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_multiplier: Option<u32>,
    /// Force a cookie renewal every N gateway requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl SessionConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Which categories are walked and which of them get imagery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct CrawlConfig {
    /// Categories walked by `discover` when none are given.
    #[serde(default)]
    #[prefer(default)]
    pub categories: Vec<i64>,
    #[serde(default)]
    #[prefer(default)]
    pub high_value_categories: Vec<i64>,
    #[serde(default)]
    #[prefer(default)]
    pub value_gated_categories: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_threshold: Option<f64>,
    /// Re-download imagery while monitoring ended lots.
    #[serde(default)]
    #[prefer(default)]
    pub monitor_images: bool,
}

impl CrawlConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Where image archives go and how they are downloaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct ArchiveConfig {
    /// Keep archives on disk instead of uploading them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_local_files: Option<bool>,
    /// Local archive root (relative paths resolve like data_dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_root: Option<String>,
    /// Object storage endpoint, e.g. "https://storage.local".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Bearer token for uploads. Prefer `OBJECT_STORAGE_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Simultaneous image downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
}

impl ArchiveConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers lotwatch config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("lotwatch").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.archive.local_root = settings.data_dir.join(ARCHIVES_SUBDIR);
        }
        if let Some(ref database) = self.database {
            if database.starts_with("sqlite:") {
                settings.database_url = Some(database.clone());
            } else if database.contains("://") {
                tracing::error!("Unsupported database URL in config: {}", database);
            } else {
                settings.database_filename = database.clone();
            }
        }
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }

        let session = &self.session;
        if let Some(attempts) = session.max_attempts {
            settings.retry.max_attempts = attempts.max(1);
        }
        if let Some(delay) = session.retry_delay_ms {
            settings.retry.base_delay = std::time::Duration::from_millis(delay);
        }
        if let Some(multiplier) = session.blocked_multiplier {
            settings.retry.blocked_multiplier = multiplier;
        }
        if let Some(interval) = session.renewal_interval {
            settings.renewal_interval = interval;
        }
        if let Some(page_size) = session.page_size {
            settings.page_size = page_size;
        }

        let crawl = &self.crawl;
        if !crawl.categories.is_empty() {
            settings.categories = crawl.categories.clone();
        }
        settings.policy.high_value_categories = crawl.high_value_categories.iter().copied().collect();
        settings.policy.value_gated_categories =
            crawl.value_gated_categories.iter().copied().collect();
        if let Some(threshold) = crawl.price_threshold {
            settings.policy.price_threshold = threshold;
        }
        settings.policy.monitor_images = crawl.monitor_images;

        let archive = &self.archive;
        if let Some(local) = archive.use_local_files {
            settings.archive.use_local_files = local;
        }
        if let Some(ref root) = archive.local_root {
            settings.archive.local_root = self.resolve_path(root, base_dir);
        }
        if let Some(ref endpoint) = archive.endpoint {
            settings.archive.endpoint = Some(endpoint.clone());
        }
        if let Some(ref bucket) = archive.bucket {
            settings.archive.bucket = bucket.clone();
        }
        if let Some(ref token) = archive.token {
            settings.archive.token = Some(token.clone());
        }
        if let Some(concurrency) = archive.concurrency {
            settings.archive.concurrency = concurrency.max(1);
        }
        if let Some(attempts) = archive.attempts {
            settings.archive.retry.attempts = attempts.max(1);
        }
        if let Some(delay) = archive.retry_delay_ms {
            settings.archive.retry.base_delay = std::time::Duration::from_millis(delay);
        }
    }
}
