//! Lot image archiving.
//!
//! Downloads a lot's pictures and thumbnails into a scratch directory,
//! zips it, and hands the archive to the configured [`ArchiveStorage`].
//! A picture that keeps failing is logged and left out; the rest of the
//! archive is still produced.

mod bundle;
mod storage;

pub use bundle::{list_entries, zip_directory};
pub use storage::{
    archive_key, ArchiveStorage, BoxedArchiveStorage, HttpObjectStorage, LocalArchiveStorage,
    ARCHIVE_PREFIX,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::cookie::Jar;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::http_client::{scaled_delay, SessionClient, TransportError};
use crate::utils::{filename_from_url, resolve_url};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("no image could be downloaded for lot {0}")]
    NothingDownloaded(i64),

    #[error("archive task failed: {0}")]
    Task(String),
}

/// Downloads one image. Implementations do not retry.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError>;

    /// Re-seed session cookies between attempts.
    async fn renew_session(&self);
}

/// Fetches each image with its own short-lived client sharing the
/// session's cookie jar.
pub struct HttpImageFetcher {
    jar: Arc<Jar>,
    user_agent: String,
    timeout: Duration,
    session: Option<Arc<SessionClient>>,
}

impl HttpImageFetcher {
    pub fn new(jar: Arc<Jar>, user_agent: &str, timeout: Duration) -> Self {
        Self {
            jar,
            user_agent: user_agent.to_string(),
            timeout,
            session: None,
        }
    }

    /// Renew cookies through this session between failed attempts.
    pub fn with_session(mut self, session: Arc<SessionClient>) -> Self {
        self.session = Some(session);
        self
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .cookie_provider(self.jar.clone())
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let response = client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn renew_session(&self) {
        if let Some(session) = &self.session {
            if let Err(e) = session.renew_cookies().await {
                warn!("Cookie renewal before image retry failed: {}", e);
            }
        }
    }
}

/// Per-image retry parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for ImageRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Result of one archive run.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveOutcome {
    /// Where the storage backend put the archive.
    pub location: String,
    pub images: usize,
    pub thumbnails: usize,
    /// Source URLs left out of the archive.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Image,
    Thumbnail,
}

impl ImageKind {
    fn folder(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Thumbnail => "thumbnails",
        }
    }
}

struct DownloadJob {
    kind: ImageKind,
    source: String,
    url: Url,
    dest: PathBuf,
}

pub struct ImageArchiver {
    fetcher: Arc<dyn ImageFetcher>,
    storage: BoxedArchiveStorage,
    base_url: Url,
    policy: ImageRetryPolicy,
    limiter: Arc<Semaphore>,
}

impl ImageArchiver {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, storage: BoxedArchiveStorage, base_url: Url) -> Self {
        Self {
            fetcher,
            storage,
            base_url,
            policy: ImageRetryPolicy::default(),
            limiter: Arc::new(Semaphore::new(2)),
        }
    }

    pub fn with_retry_policy(mut self, policy: ImageRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cap simultaneous image downloads.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    pub fn storage_name(&self) -> &'static str {
        self.storage.name()
    }

    /// Download, package and store a lot's imagery.
    ///
    /// Returns `Ok(None)` when both lists are empty.
    pub async fn archive_lot(
        &self,
        lot_id: i64,
        image_urls: &[String],
        thumbnail_urls: &[String],
    ) -> Result<Option<ArchiveOutcome>, ArchiveError> {
        if image_urls.is_empty() && thumbnail_urls.is_empty() {
            return Ok(None);
        }

        let scratch = tempfile::Builder::new()
            .prefix(&format!("lot-{}-", lot_id))
            .tempdir()?;
        for kind in [ImageKind::Image, ImageKind::Thumbnail] {
            tokio::fs::create_dir_all(scratch.path().join(kind.folder())).await?;
        }

        let mut failed = Vec::new();
        let mut jobs = Vec::new();
        for (kind, urls) in [
            (ImageKind::Image, image_urls),
            (ImageKind::Thumbnail, thumbnail_urls),
        ] {
            for (index, raw) in urls.iter().enumerate() {
                match resolve_url(&self.base_url, raw) {
                    Some(url) => jobs.push(DownloadJob {
                        kind,
                        source: raw.clone(),
                        dest: scratch
                            .path()
                            .join(kind.folder())
                            .join(filename_from_url(url.as_str(), index)),
                        url,
                    }),
                    None => {
                        warn!("Lot {}: unusable image URL {:?}", lot_id, raw);
                        failed.push(raw.clone());
                    }
                }
            }
        }

        let results = join_all(jobs.iter().map(|job| self.download(lot_id, job))).await;

        let mut images = 0;
        let mut thumbnails = 0;
        for (job, ok) in jobs.iter().zip(results) {
            match (ok, job.kind) {
                (true, ImageKind::Image) => images += 1,
                (true, ImageKind::Thumbnail) => thumbnails += 1,
                (false, _) => failed.push(job.source.clone()),
            }
        }

        if images + thumbnails == 0 {
            return Err(ArchiveError::NothingDownloaded(lot_id));
        }

        let root = scratch.path().to_path_buf();
        let bytes = tokio::task::spawn_blocking(move || zip_directory(&root))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))??;

        let location = self.storage.store(&archive_key(lot_id), bytes).await?;
        info!(
            "Lot {}: archived {} images, {} thumbnails to {} ({} failed)",
            lot_id,
            images,
            thumbnails,
            location,
            failed.len()
        );

        Ok(Some(ArchiveOutcome {
            location,
            images,
            thumbnails,
            failed,
        }))
    }

    /// Download one image with bounded retry; `false` once attempts run out.
    async fn download(&self, lot_id: i64, job: &DownloadJob) -> bool {
        let Ok(_permit) = self.limiter.acquire().await else {
            return false;
        };

        let mut delay = self.policy.base_delay;
        for attempt in 1..=self.policy.attempts {
            match self.fetcher.fetch(&job.url).await {
                Ok(bytes) => match write_image(&job.dest, &bytes).await {
                    Ok(path) => {
                        debug!("Lot {}: saved {}", lot_id, path.display());
                        return true;
                    }
                    Err(e) => {
                        warn!("Lot {}: cannot write {}: {}", lot_id, job.dest.display(), e);
                        return false;
                    }
                },
                Err(e) if attempt < self.policy.attempts => {
                    debug!(
                        "Lot {}: {} attempt {} failed: {}, retrying in {:?}",
                        lot_id, job.url, attempt, e, delay
                    );
                    self.fetcher.renew_session().await;
                    tokio::time::sleep(delay).await;
                    delay = scaled_delay(delay, 2);
                }
                Err(e) => {
                    warn!(
                        "Lot {}: giving up on {} after {} attempts: {}",
                        lot_id, job.url, attempt, e
                    );
                }
            }
        }
        false
    }
}

/// Write image bytes, adding an extension sniffed from the content when the
/// URL had none.
async fn write_image(dest: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let path = match (dest.extension(), infer::get(bytes)) {
        (None, Some(kind)) => dest.with_extension(kind.extension()),
        _ => dest.to_path_buf(),
    };
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[derive(Default)]
    struct FakeFetcher {
        /// Remaining failures per URL; `usize::MAX` fails forever.
        failures: Mutex<HashMap<String, usize>>,
        calls: AtomicUsize,
        renewals: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeFetcher {
        fn failing(url: &str, times: usize) -> Self {
            let fetcher = Self::default();
            fetcher.failures.lock().unwrap().insert(url.to_string(), times);
            fetcher
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(url.as_str()) {
                if *left > 0 {
                    *left = left.saturating_sub(1);
                    return Err(TransportError::Timeout("slow".into()));
                }
            }
            Ok(PNG.to_vec())
        }

        async fn renew_session(&self) {
            self.renewals.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn archiver(fetcher: Arc<FakeFetcher>, root: &Path) -> ImageArchiver {
        ImageArchiver::new(
            fetcher,
            Arc::new(LocalArchiveStorage::new(root)),
            Url::parse("https://auction.test/").unwrap(),
        )
        .with_retry_policy(ImageRetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        })
    }

    fn read_archive(location: &str) -> Vec<String> {
        list_entries(&std::fs::read(location).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn empty_lists_are_a_no_op() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let outcome = archiver(fetcher.clone(), dir.path())
            .archive_lot(1, &[], &[])
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join(ARCHIVE_PREFIX).exists());
    }

    #[tokio::test]
    async fn archives_images_and_thumbnails() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let images = vec!["/i/cover.jpg?w=800".to_string(), "//cdn.auction.test/i/back.jpg".to_string()];
        let thumbs = vec!["https://cdn.auction.test/t/cover.jpg".to_string()];

        let outcome = archiver(fetcher, dir.path())
            .archive_lot(5, &images, &thumbs)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.images, 2);
        assert_eq!(outcome.thumbnails, 1);
        assert!(outcome.failed.is_empty());
        assert!(outcome.location.ends_with("_compressed_images/5.zip"));
        assert_eq!(
            read_archive(&outcome.location),
            vec!["images/000_cover.jpg", "images/001_back.jpg", "thumbnails/000_cover.jpg"]
        );
    }

    #[tokio::test]
    async fn one_permanent_failure_keeps_the_rest() {
        let dir = tempdir().unwrap();
        let bad = "https://cdn.auction.test/i/3.jpg";
        let fetcher = Arc::new(FakeFetcher::failing(bad, usize::MAX));
        let images: Vec<String> = (1..=5)
            .map(|i| format!("https://cdn.auction.test/i/{}.jpg", i))
            .collect();

        let outcome = archiver(fetcher.clone(), dir.path())
            .archive_lot(9, &images, &[])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.images, 4);
        assert_eq!(outcome.failed, vec![bad.to_string()]);
        assert_eq!(read_archive(&outcome.location).len(), 4);
        // 4 successes + 3 attempts on the bad one
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 7);
        assert_eq!(fetcher.renewals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let dir = tempdir().unwrap();
        let flaky = "https://cdn.auction.test/i/1.jpg";
        let fetcher = Arc::new(FakeFetcher::failing(flaky, 2));

        let outcome = archiver(fetcher.clone(), dir.path())
            .archive_lot(2, &[flaky.to_string()], &[])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.images, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn everything_failing_is_an_error() {
        let dir = tempdir().unwrap();
        let url = "https://cdn.auction.test/i/1.jpg";
        let fetcher = Arc::new(FakeFetcher::failing(url, usize::MAX));

        let err = archiver(fetcher, dir.path())
            .archive_lot(3, &[url.to_string()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NothingDownloaded(3)));
    }

    #[tokio::test]
    async fn downloads_are_bounded() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let images: Vec<String> = (0..8)
            .map(|i| format!("https://cdn.auction.test/i/{}.jpg", i))
            .collect();

        archiver(fetcher.clone(), dir.path())
            .archive_lot(4, &images, &[])
            .await
            .unwrap();

        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn extension_is_sniffed_when_missing() {
        let dir = tempdir().unwrap();
        let path = write_image(&dir.path().join("000_photo"), PNG).await.unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));

        let kept = write_image(&dir.path().join("001_photo.jpg"), PNG).await.unwrap();
        assert_eq!(kept.extension().and_then(|e| e.to_str()), Some("jpg"));
    }
}
