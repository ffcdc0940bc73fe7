//! Archive storage backends.
//!
//! Exactly one backend is active per process, chosen from configuration at
//! start-up. Both place an archive under the same deterministic key.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, info};

use super::ArchiveError;

/// Key prefix shared by every backend.
pub const ARCHIVE_PREFIX: &str = "_compressed_images";

/// Deterministic storage key for a lot's archive.
pub fn archive_key(lot_id: i64) -> String {
    format!("{}/{}.zip", ARCHIVE_PREFIX, lot_id)
}

#[async_trait]
pub trait ArchiveStorage: Send + Sync {
    /// Store `bytes` under `key` and return the archive's location.
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<String, ArchiveError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Shared storage trait object.
pub type BoxedArchiveStorage = Arc<dyn ArchiveStorage>;

/// Archives on the local filesystem under `root`.
#[derive(Debug, Clone)]
pub struct LocalArchiveStorage {
    root: PathBuf,
}

impl LocalArchiveStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArchiveStorage for LocalArchiveStorage {
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<String, ArchiveError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Readers never observe a partial archive.
        let partial = path.with_extension("zip.part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &path).await?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path.display().to_string())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Archives uploaded with `PUT {endpoint}/{bucket}/{key}`.
pub struct HttpObjectStorage {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStorage {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ArchiveError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiveError::Upload(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl ArchiveStorage for HttpObjectStorage {
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<String, ArchiveError> {
        let url = self.object_url(key);
        let size = bytes.len();

        let mut request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/zip")
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ArchiveError::Upload(format!("{}: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Upload(format!("{}: HTTP {}", url, status)));
        }

        info!("Uploaded {} bytes to {}", size, url);
        Ok(url)
    }

    fn name(&self) -> &'static str {
        "object-storage"
    }
}
