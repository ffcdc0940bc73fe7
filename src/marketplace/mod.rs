//! Typed operations over the marketplace session.

mod types;

pub use types::{
    DescriptionResponse, LotListRequest, LOT_DESCRIPTION_PATH, LOT_INFO_PATH, LOT_LIST_PATH,
    DEFAULT_PAGE_SIZE, DEFAULT_RENEWAL_INTERVAL,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::http_client::{SessionClient, SessionError};
use crate::models::{LotIdPage, LotPayload};
use types::LotIdRequest;

/// Read side of the upstream marketplace.
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Fetch one lot. Every failure, including exhausted retries, is `None`.
    async fn get_lot(&self, id: i64) -> Option<LotPayload>;

    /// Fetch a lot's full description. A missing description is an empty string.
    async fn get_description(&self, id: i64) -> Result<String, SessionError>;

    /// Walk every page of a category and return its name and lot ids in
    /// upstream order (end date ascending).
    async fn get_lot_ids_for_category(
        &self,
        category_id: i64,
    ) -> Result<(String, Vec<i64>), SessionError>;
}

/// Shared marketplace trait object.
pub type BoxedMarketplace = Arc<dyn Marketplace>;

/// [`Marketplace`] backed by a [`SessionClient`].
pub struct MarketplaceClient {
    session: Arc<SessionClient>,
    page_size: u32,
    renewal_interval: u64,
    requests: AtomicU64,
}

impl MarketplaceClient {
    pub fn new(session: Arc<SessionClient>) -> Self {
        Self {
            session,
            page_size: DEFAULT_PAGE_SIZE,
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
            requests: AtomicU64::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Force a cookie renewal every `interval` requests; 0 disables it.
    pub fn with_renewal_interval(mut self, interval: u64) -> Self {
        self.renewal_interval = interval;
        self
    }

    pub fn session(&self) -> &Arc<SessionClient> {
        &self.session
    }

    /// Count one request and renew cookies when the interval is reached.
    async fn tick(&self) {
        let count = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        if self.renewal_interval > 0 && count % self.renewal_interval == 0 {
            debug!("Proactive cookie renewal after {} requests", count);
            if let Err(e) = self.session.renew_cookies().await {
                warn!("Proactive cookie renewal failed: {}", e);
            }
        }
    }

    async fn fetch_page(
        &self,
        category_id: i64,
        offset: u64,
    ) -> Result<LotIdPage, SessionError> {
        self.tick().await;
        let url = self.session.endpoint(LOT_LIST_PATH)?;
        let body = LotListRequest::page(category_id, offset, self.page_size);
        let page: Option<LotIdPage> = self.session.post_json(&url, &body).await?;
        Ok(page.unwrap_or_default())
    }
}

#[async_trait]
impl Marketplace for MarketplaceClient {
    async fn get_lot(&self, id: i64) -> Option<LotPayload> {
        self.tick().await;
        let url = match self.session.endpoint(LOT_INFO_PATH) {
            Ok(url) => url,
            Err(e) => {
                warn!("Lot {}: {}", id, e);
                return None;
            }
        };

        match self
            .session
            .post_json::<_, Option<LotPayload>>(&url, &LotIdRequest { id })
            .await
        {
            Ok(lot) => lot,
            Err(SessionError::NotFound(_)) => {
                debug!("Lot {} not found upstream", id);
                None
            }
            Err(e) => {
                warn!("Lot {} lookup failed: {}", id, e);
                None
            }
        }
    }

    async fn get_description(&self, id: i64) -> Result<String, SessionError> {
        self.tick().await;
        let url = self.session.endpoint(LOT_DESCRIPTION_PATH)?;
        match self
            .session
            .post_json::<_, Option<DescriptionResponse>>(&url, &LotIdRequest { id })
            .await
        {
            Ok(response) => Ok(response.and_then(|r| r.description).unwrap_or_default()),
            Err(SessionError::NotFound(_)) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    async fn get_lot_ids_for_category(
        &self,
        category_id: i64,
    ) -> Result<(String, Vec<i64>), SessionError> {
        let mut name: Option<String> = None;
        let mut ids = Vec::new();
        let mut offset = 0u64;

        loop {
            let page = match self.fetch_page(category_id, offset).await {
                Ok(page) => page,
                // Keep what earlier pages returned; the next run picks up the rest.
                Err(e) if offset > 0 => {
                    warn!(
                        "Category {}: page at offset {} failed, stopping with {} ids: {}",
                        category_id,
                        offset,
                        ids.len(),
                        e
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            if page.is_empty() {
                break;
            }
            if name.is_none() {
                name = page.category_name.clone().filter(|n| !n.trim().is_empty());
            }
            ids.extend(page.ids());
            offset += page.lots.len() as u64;
        }

        let name = name.unwrap_or_else(|| format!("Category {}", category_id));
        info!("Category {} ({}): {} lot ids", category_id, name, ids.len());
        Ok((name, ids))
    }
}
