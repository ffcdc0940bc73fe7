//! Lot upsert: the write path shared by discovery, monitoring and manual
//! refreshes.
//!
//! For one fetched payload and the category it was found under, the handler:
//! - resolves the category (first-seen name wins)
//! - fetches the description and derives the publication year
//! - maps the payload onto a new [`Lot`] or overwrites the stored one
//! - settles `is_monitored` / `final_price` from the auction's end date
//! - persists, then archives imagery unless the lot is less valuable

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::http_client::SessionError;
use crate::marketplace::BoxedMarketplace;
use crate::models::{AuctionPhase, Category, Lot, LotPayload};
use crate::repository::{BoxedLotRepository, RepositoryError};
use crate::services::archive::{ArchiveError, ImageArchiver};
use crate::services::year::extract_year_from_lot;
use crate::utils::normalize_text;

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("lot {lot_id}: repository failure: {source}")]
    Repository {
        lot_id: i64,
        #[source]
        source: RepositoryError,
    },

    #[error("lot {lot_id}: archive failure: {source}")]
    Archive {
        lot_id: i64,
        #[source]
        source: ArchiveError,
    },

    #[error("lot {lot_id}: marketplace failure: {source}")]
    Marketplace {
        lot_id: i64,
        #[source]
        source: SessionError,
    },
}

impl UpsertError {
    pub fn lot_id(&self) -> i64 {
        match self {
            Self::Repository { lot_id, .. }
            | Self::Archive { lot_id, .. }
            | Self::Marketplace { lot_id, .. } => *lot_id,
        }
    }
}

/// Caller-chosen flags for one upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOptions {
    pub download_images: bool,
    pub is_less_valuable: bool,
}

impl UpsertOptions {
    pub fn with_images() -> Self {
        Self {
            download_images: true,
            is_less_valuable: false,
        }
    }

    pub fn without_images() -> Self {
        Self::default()
    }

    pub fn less_valuable() -> Self {
        Self {
            download_images: false,
            is_less_valuable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub lot: Lot,
    pub created: bool,
    pub archived: bool,
}

/// Monitoring flag and final price for a payload at `now`.
///
/// - no dates at all: not monitored, upstream final price as-is
/// - end date not reached: monitored, no final price
/// - end date passed: not monitored, final price (or the current price when
///   something sold)
/// - begin date only: not monitored, no final price
pub fn settle_lifecycle(payload: &LotPayload, now: DateTime<Utc>) -> (bool, Option<f64>) {
    if payload.begin_date.is_none() && payload.end_date.is_none() {
        return (false, payload.final_price);
    }
    match AuctionPhase::of(payload.end_date, now) {
        AuctionPhase::Open => (true, None),
        AuctionPhase::Ended => {
            let sold_at = (payload.sold_quantity > 0).then_some(payload.price);
            (false, payload.final_price.or(sold_at))
        }
        AuctionPhase::Unknown => (false, None),
    }
}

pub struct LotUpsertHandler {
    repository: BoxedLotRepository,
    marketplace: BoxedMarketplace,
    archiver: Option<Arc<ImageArchiver>>,
}

impl LotUpsertHandler {
    pub fn new(repository: BoxedLotRepository, marketplace: BoxedMarketplace) -> Self {
        Self {
            repository,
            marketplace,
            archiver: None,
        }
    }

    pub fn with_archiver(mut self, archiver: Arc<ImageArchiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    pub fn repository(&self) -> &BoxedLotRepository {
        &self.repository
    }

    pub fn marketplace(&self) -> &BoxedMarketplace {
        &self.marketplace
    }

    /// Upsert one payload under `category`. Failures are logged with the lot
    /// id and returned.
    pub async fn upsert(
        &self,
        payload: &LotPayload,
        category: &Category,
        options: UpsertOptions,
    ) -> Result<UpsertOutcome, UpsertError> {
        self.upsert_at(payload, category, options, Utc::now()).await
    }

    /// [`Self::upsert`] with an explicit clock.
    pub async fn upsert_at(
        &self,
        payload: &LotPayload,
        category: &Category,
        options: UpsertOptions,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, UpsertError> {
        let result = self.run(payload, category, options, now).await;
        if let Err(e) = &result {
            error!("Upsert of lot {} failed: {}", payload.id, e);
        }
        result
    }

    /// Re-fetch a lot by id and upsert it. `Ok(None)` when upstream has no
    /// such lot.
    ///
    /// Without an explicit category the stored lot's category is kept, and
    /// only a lot never stored before falls back to what the payload reports.
    pub async fn refresh(
        &self,
        lot_id: i64,
        category: Option<&Category>,
        options: UpsertOptions,
    ) -> Result<Option<UpsertOutcome>, UpsertError> {
        let Some(payload) = self.marketplace.get_lot(lot_id).await else {
            return Ok(None);
        };
        let category = match category {
            Some(category) => category.clone(),
            None => self.stored_category(&payload).await?,
        };
        self.upsert(&payload, &category, options).await.map(Some)
    }

    async fn stored_category(&self, payload: &LotPayload) -> Result<Category, UpsertError> {
        let stored = self
            .repository
            .find_lot(payload.id)
            .await
            .map_err(|source| UpsertError::Repository {
                lot_id: payload.id,
                source,
            })?;
        Ok(match stored {
            Some(lot) => Category::new(lot.category_id, lot.category_name),
            None => Category::new(
                payload.category_id,
                payload
                    .category_name
                    .clone()
                    .unwrap_or_else(|| format!("Category {}", payload.category_id)),
            ),
        })
    }

    async fn run(
        &self,
        payload: &LotPayload,
        category: &Category,
        options: UpsertOptions,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, UpsertError> {
        let lot_id = payload.id;
        let repo_err = |source| UpsertError::Repository { lot_id, source };

        let existing = self.repository.find_lot(lot_id).await.map_err(repo_err)?;
        let category = self
            .repository
            .find_or_create_category(category.category_id, &category.name)
            .await
            .map_err(repo_err)?;

        let description = self
            .marketplace
            .get_description(lot_id)
            .await
            .map_err(|source| UpsertError::Marketplace { lot_id, source })?;

        let (is_monitored, final_price) = settle_lifecycle(payload, now);
        let created = existing.is_none();

        let mut lot = Lot {
            id: lot_id,
            category_id: category.category_id,
            category_name: category.name,
            normalized_title: normalize_text(&payload.name),
            title: payload.name.clone(),
            normalized_description: normalize_text(&description),
            year_published: extract_year_from_lot(&description, &payload.name),
            description,
            begin_date: payload.begin_date,
            end_date: payload.end_date,
            price: payload.price,
            start_price: payload.start_price,
            final_price,
            seller_name: payload.seller_name().map(str::to_string),
            city: payload.city.clone(),
            lot_type: payload.lot_type,
            status: payload.status,
            sold_quantity: payload.sold_quantity,
            bids_count: payload.bids_count,
            pics_count: payload.pics_count(),
            image_urls: payload.image_urls(),
            thumbnail_urls: payload.thumbnail_urls(),
            pics_ratio: payload.pics_ratio(),
            is_monitored,
            is_less_valuable: options.is_less_valuable,
            is_images_compressed: false,
            image_archive_url: None,
            archived_at: None,
            first_seen_at: now,
        };

        if let Some(previous) = existing {
            lot.first_seen_at = previous.first_seen_at;
            lot.is_images_compressed = previous.is_images_compressed;
            lot.image_archive_url = previous.image_archive_url;
            lot.archived_at = previous.archived_at;

            // A known final price survives a transient gap upstream.
            if lot.final_price.is_none() && previous.final_price.is_some() {
                lot.final_price = previous.final_price;
                lot.is_monitored = false;
            }
        }

        if lot.is_less_valuable && lot.is_images_compressed {
            warn!(
                "Lot {} is now less valuable; dropping archive reference {:?}",
                lot_id, lot.image_archive_url
            );
            lot.clear_archive();
        }

        self.repository.upsert_lot(&lot).await.map_err(repo_err)?;
        debug!(
            "Lot {} {} (monitored={}, final_price={:?})",
            lot_id,
            if created { "created" } else { "updated" },
            lot.is_monitored,
            lot.final_price
        );

        let mut archived = false;
        if options.download_images && !lot.is_less_valuable {
            archived = self.archive(&mut lot, now).await?;
        }

        Ok(UpsertOutcome {
            lot,
            created,
            archived,
        })
    }

    async fn archive(&self, lot: &mut Lot, now: DateTime<Utc>) -> Result<bool, UpsertError> {
        let Some(archiver) = &self.archiver else {
            debug!("Lot {}: images requested but no archiver configured", lot.id);
            return Ok(false);
        };

        let result = archiver
            .archive_lot(lot.id, &lot.image_urls, &lot.thumbnail_urls)
            .await;
        match result {
            Ok(Some(outcome)) => {
                lot.mark_archived(outcome.location, now);
                self.repository
                    .upsert_lot(lot)
                    .await
                    .map_err(|source| UpsertError::Repository {
                        lot_id: lot.id,
                        source,
                    })?;
                info!("Lot {}: images archived", lot.id);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e @ (ArchiveError::Upload(_) | ArchiveError::NothingDownloaded(_))) => {
                warn!("Lot {}: archive not stored: {}", lot.id, e);
                Ok(false)
            }
            Err(source) => Err(UpsertError::Archive {
                lot_id: lot.id,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LotStatus;
    use chrono::Duration;

    fn payload(end_date: Option<DateTime<Utc>>) -> LotPayload {
        serde_json::from_value(serde_json::json!({
            "id": 10,
            "name": "Сказки",
            "categoryId": 3,
            "price": 700.0,
            "startPrice": 1.0,
        }))
        .map(|mut p: LotPayload| {
            p.begin_date = end_date.map(|d| d - Duration::days(7));
            p.end_date = end_date;
            p
        })
        .unwrap()
    }

    #[test]
    fn undated_lot_takes_final_price_as_is() {
        let mut p = payload(None);
        p.final_price = Some(650.0);
        assert_eq!(settle_lifecycle(&p, Utc::now()), (false, Some(650.0)));
    }

    #[test]
    fn open_auction_is_monitored_without_price() {
        let now = Utc::now();
        let mut p = payload(Some(now + Duration::hours(3)));
        p.final_price = Some(650.0);
        assert_eq!(settle_lifecycle(&p, now), (true, None));
        assert_eq!(settle_lifecycle(&payload(Some(now)), now), (true, None));
    }

    #[test]
    fn ended_auction_settles_price() {
        let now = Utc::now();
        let mut p = payload(Some(now - Duration::hours(3)));
        assert_eq!(settle_lifecycle(&p, now), (false, None));

        p.status = LotStatus::Sold;
        p.sold_quantity = 1;
        assert_eq!(settle_lifecycle(&p, now), (false, Some(700.0)));

        p.final_price = Some(720.0);
        assert_eq!(settle_lifecycle(&p, now), (false, Some(720.0)));
    }

    #[test]
    fn begin_only_is_not_monitored() {
        let now = Utc::now();
        let mut p = payload(None);
        p.begin_date = Some(now - Duration::days(1));
        p.final_price = Some(10.0);
        assert_eq!(settle_lifecycle(&p, now), (false, None));
    }
}
