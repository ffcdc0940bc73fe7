//! Application settings and the wiring that turns them into a pipeline.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::cookie::Jar;
use url::Url;

use crate::http_client::{resolve_user_agent, RetryPolicy, SessionClient};
use crate::marketplace::{MarketplaceClient, DEFAULT_PAGE_SIZE, DEFAULT_RENEWAL_INTERVAL};
use crate::repository::{migrations, DieselLotRepository, SqlitePool};
use crate::services::archive::{
    BoxedArchiveStorage, HttpImageFetcher, HttpObjectStorage, ImageArchiver, ImageRetryPolicy,
    LocalArchiveStorage,
};
use crate::services::crawl::CrawlPolicy;

use super::{ARCHIVES_SUBDIR, DEFAULT_BASE_URL, DEFAULT_DATABASE_FILENAME, DEFAULT_PRICE_THRESHOLD};

/// Resolved archive storage settings.
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    /// Keep archives under `local_root` instead of uploading them.
    pub use_local_files: bool,
    pub local_root: PathBuf,
    pub endpoint: Option<String>,
    pub bucket: String,
    pub token: Option<String>,
    pub concurrency: usize,
    pub retry: ImageRetryPolicy,
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Marketplace origin.
    pub base_url: String,
    /// Configured user agent; `None` uses the crate's own.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    pub retry: RetryPolicy,
    pub renewal_interval: u64,
    pub page_size: u32,
    /// Categories walked by default.
    pub categories: Vec<i64>,
    pub policy: CrawlPolicy,
    pub archive: ArchiveSettings,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lotwatch");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            archive: ArchiveSettings {
                use_local_files: true,
                local_root: data_dir.join(ARCHIVES_SUBDIR),
                endpoint: None,
                bucket: "lots".to_string(),
                token: None,
                concurrency: 2,
                retry: ImageRetryPolicy::default(),
            },
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
            request_timeout: 30,
            retry: RetryPolicy::default(),
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            categories: Vec::new(),
            policy: CrawlPolicy {
                price_threshold: DEFAULT_PRICE_THRESHOLD,
                ..CrawlPolicy::default()
            },
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_url.is_some() || self.database_path().exists()
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })?;
        if self.archive.use_local_files {
            fs::create_dir_all(&self.archive.local_root).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create archive directory '{}': {}",
                        self.archive.local_root.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn parsed_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("Invalid base URL '{}'", self.base_url))
    }

    /// Create tables if needed and open the SQLite repository.
    pub async fn open_repository(&self) -> anyhow::Result<DieselLotRepository> {
        let url = self.database_url();
        migrations::run_migrations(&url)
            .await
            .with_context(|| format!("Failed to prepare database {}", url))?;
        Ok(DieselLotRepository::new(SqlitePool::new(&url)))
    }

    /// Build the session client with a user agent resolved once.
    pub fn session_client(&self, user_agent: &str) -> anyhow::Result<SessionClient> {
        SessionClient::builder(self.parsed_base_url()?)
            .user_agent(user_agent)
            .timeout(self.request_timeout())
            .retry_policy(self.retry)
            .build()
            .context("Failed to build marketplace session")
    }

    pub fn marketplace(&self, session: Arc<SessionClient>) -> MarketplaceClient {
        MarketplaceClient::new(session)
            .with_page_size(self.page_size)
            .with_renewal_interval(self.renewal_interval)
    }

    /// The archive backend chosen once at start-up.
    pub fn archive_storage(&self) -> anyhow::Result<BoxedArchiveStorage> {
        let archive = &self.archive;
        if archive.use_local_files {
            return Ok(Arc::new(LocalArchiveStorage::new(archive.local_root.clone())));
        }

        let endpoint = archive
            .endpoint
            .as_deref()
            .context("archive.endpoint is required when use_local_files is false")?;
        let storage = HttpObjectStorage::new(
            endpoint,
            &archive.bucket,
            archive.token.clone(),
            self.request_timeout(),
        )?;
        Ok(Arc::new(storage))
    }

    /// Image archiver sharing the session's cookie jar.
    pub fn image_archiver(
        &self,
        session: &Arc<SessionClient>,
        user_agent: &str,
    ) -> anyhow::Result<ImageArchiver> {
        let jar = session
            .cookie_jar()
            .unwrap_or_else(|| Arc::new(Jar::default()));
        let fetcher = HttpImageFetcher::new(jar, user_agent, self.request_timeout())
            .with_session(session.clone());

        Ok(ImageArchiver::new(
            Arc::new(fetcher),
            self.archive_storage()?,
            self.parsed_base_url()?,
        )
        .with_retry_policy(self.archive.retry)
        .with_concurrency(self.archive.concurrency))
    }

    /// The configured user agent, with "impersonate" resolved.
    pub fn resolved_user_agent(&self) -> String {
        resolve_user_agent(self.user_agent.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let settings = Settings::with_data_dir(PathBuf::from("/data"));
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(200));
        assert_eq!(settings.retry.blocked_multiplier, 10);
        assert_eq!(settings.renewal_interval, 30);
        assert_eq!(settings.page_size, 200);
        assert_eq!(settings.archive.concurrency, 2);
        assert_eq!(settings.archive.retry.attempts, 3);
        assert_eq!(settings.archive.local_root, PathBuf::from("/data/archives"));
        assert_eq!(settings.database_url(), "sqlite:/data/lotwatch.db");
    }

    #[test]
    fn object_storage_needs_endpoint() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/data"));
        settings.archive.use_local_files = false;
        assert!(settings.archive_storage().is_err());

        settings.archive.endpoint = Some("https://storage.local".to_string());
        let storage = settings.archive_storage().unwrap();
        assert_eq!(storage.name(), "object-storage");
    }

    #[test]
    fn local_storage_is_default() {
        let settings = Settings::with_data_dir(PathBuf::from("/data"));
        assert_eq!(settings.archive_storage().unwrap().name(), "local");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/data"));
        settings.base_url = "not a url".to_string();
        assert!(settings.session_client("agent").is_err());
    }

    #[tokio::test]
    async fn open_repository_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().to_path_buf());
        settings.ensure_directories().unwrap();

        settings.open_repository().await.unwrap();
        assert!(settings.database_exists());
    }
}
