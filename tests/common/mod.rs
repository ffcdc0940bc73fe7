//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::watch;
use url::Url;

use lotwatch::http_client::{SessionError, TransportError};
use lotwatch::marketplace::Marketplace;
use lotwatch::models::{Category, LotPayload};
use lotwatch::repository::InMemoryLotRepository;
use lotwatch::services::archive::{
    ImageArchiver, ImageFetcher, ImageRetryPolicy, LocalArchiveStorage,
};
use lotwatch::services::LotUpsertHandler;

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

pub const BASE_URL: &str = "https://auction.test/";

/// A lot worth tracking: unit start price, no dates.
pub fn payload(id: i64, category_id: i64) -> LotPayload {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": format!("Книга {}", id),
        "categoryId": category_id,
        "price": 500.0,
        "startPrice": 1.0,
    }))
    .unwrap()
}

pub fn category(id: i64, name: &str) -> Category {
    Category::new(id, name)
}

pub fn with_end(mut payload: LotPayload, end: DateTime<Utc>) -> LotPayload {
    payload.begin_date = Some(end - chrono::Duration::days(7));
    payload.end_date = Some(end);
    payload
}

pub fn with_pictures(mut payload: LotPayload, urls: &[&str]) -> LotPayload {
    payload.pictures = urls
        .iter()
        .map(|url| {
            serde_json::from_value(serde_json::json!({ "url": url }))
                .unwrap()
        })
        .collect();
    payload
}

/// Marketplace answering from in-memory tables.
#[derive(Default)]
pub struct ScriptedMarketplace {
    lots: Mutex<HashMap<i64, LotPayload>>,
    descriptions: Mutex<HashMap<i64, String>>,
    categories: Mutex<HashMap<i64, (String, Vec<i64>)>>,
    failing_descriptions: Mutex<HashSet<i64>>,
    description_delays: Mutex<VecDeque<Duration>>,
    cancel_after: Mutex<Option<(usize, watch::Sender<bool>)>>,
    pub lot_requests: AtomicUsize,
}

impl ScriptedMarketplace {
    pub fn put_lot(&self, payload: LotPayload) {
        self.lots.lock().unwrap().insert(payload.id, payload);
    }

    pub fn remove_lot(&self, id: i64) {
        self.lots.lock().unwrap().remove(&id);
    }

    pub fn put_description(&self, id: i64, text: &str) {
        self.descriptions
            .lock()
            .unwrap()
            .insert(id, text.to_string());
    }

    pub fn put_category(&self, id: i64, name: &str, lot_ids: &[i64]) {
        self.categories
            .lock()
            .unwrap()
            .insert(id, (name.to_string(), lot_ids.to_vec()));
    }

    pub fn fail_description(&self, id: i64) {
        self.failing_descriptions.lock().unwrap().insert(id);
    }

    /// Delay successive description calls by these durations, in order.
    pub fn delay_descriptions(&self, delays: &[Duration]) {
        self.description_delays
            .lock()
            .unwrap()
            .extend(delays.iter().copied());
    }

    /// Flip `cancel` while serving the `n`th lot request.
    pub fn cancel_after(&self, n: usize, cancel: watch::Sender<bool>) {
        *self.cancel_after.lock().unwrap() = Some((n, cancel));
    }

    pub fn lot_requests(&self) -> usize {
        self.lot_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Marketplace for ScriptedMarketplace {
    async fn get_lot(&self, id: i64) -> Option<LotPayload> {
        let served = self.lot_requests.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, cancel)) = self.cancel_after.lock().unwrap().as_ref() {
            if served == *n {
                cancel.send(true).unwrap();
            }
        }
        self.lots.lock().unwrap().get(&id).cloned()
    }

    async fn get_description(&self, id: i64) -> Result<String, SessionError> {
        let delay = self.description_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_descriptions.lock().unwrap().contains(&id) {
            return Err(SessionError::Timeout {
                url: format!("{}api/lots/description", BASE_URL),
                attempts: 3,
            });
        }
        Ok(self
            .descriptions
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_lot_ids_for_category(
        &self,
        category_id: i64,
    ) -> Result<(String, Vec<i64>), SessionError> {
        self.categories
            .lock()
            .unwrap()
            .get(&category_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(format!("category {}", category_id)))
    }
}

/// Image fetcher that fails forever on URLs containing "broken".
#[derive(Default)]
pub struct FakeFetcher {
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.as_str().contains("broken") {
            return Err(TransportError::Status {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        Ok(PNG.to_vec())
    }

    async fn renew_session(&self) {}
}

/// Everything a pipeline test needs, wired around fakes.
pub struct Harness {
    pub repository: Arc<InMemoryLotRepository>,
    pub marketplace: Arc<ScriptedMarketplace>,
    pub fetcher: Arc<FakeFetcher>,
    pub handler: Arc<LotUpsertHandler>,
    pub archive_root: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryLotRepository::new());
        let marketplace = Arc::new(ScriptedMarketplace::default());
        let fetcher = Arc::new(FakeFetcher::default());
        let archive_root = tempfile::tempdir().unwrap();

        let archiver = ImageArchiver::new(
            fetcher.clone(),
            Arc::new(LocalArchiveStorage::new(archive_root.path())),
            Url::parse(BASE_URL).unwrap(),
        )
        .with_retry_policy(ImageRetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        });

        let handler = LotUpsertHandler::new(repository.clone(), marketplace.clone())
            .with_archiver(Arc::new(archiver));

        Self {
            repository,
            marketplace,
            fetcher,
            handler: Arc::new(handler),
            archive_root,
        }
    }

    pub fn archive_dir(&self) -> &Path {
        self.archive_root.path()
    }
}
