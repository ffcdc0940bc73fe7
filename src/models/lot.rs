//! Persisted lot record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::{LotStatus, LotType};

/// Where a lot's auction stands relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionPhase {
    /// No end date is known.
    Unknown,
    /// End date not yet reached.
    Open,
    /// End date is in the past.
    Ended,
}

impl AuctionPhase {
    /// Classify an auction by its end date.
    ///
    /// An end date equal to `now` still counts as open.
    pub fn of(end_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match end_date {
            None => Self::Unknown,
            Some(end) if end < now => Self::Ended,
            Some(_) => Self::Open,
        }
    }
}

/// One marketplace lot, keyed by its upstream id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Upstream marketplace id; never generated locally.
    pub id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub title: String,
    pub normalized_title: String,
    pub description: String,
    pub normalized_description: String,
    pub begin_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Current price at fetch time.
    pub price: f64,
    pub start_price: f64,
    /// Authoritative sale price, set once the auction is known to have ended.
    pub final_price: Option<f64>,
    pub year_published: Option<i32>,
    pub seller_name: Option<String>,
    pub city: Option<String>,
    pub lot_type: LotType,
    pub status: LotStatus,
    pub sold_quantity: i64,
    pub bids_count: i64,
    pub pics_count: i64,
    pub image_urls: Vec<String>,
    pub thumbnail_urls: Vec<String>,
    pub pics_ratio: Vec<f64>,
    /// Auction still open; the final price is not yet known.
    pub is_monitored: bool,
    /// Below the category's price threshold; imagery is never archived.
    pub is_less_valuable: bool,
    pub is_images_compressed: bool,
    pub image_archive_url: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
    pub first_seen_at: DateTime<Utc>,
}

impl Lot {
    /// Phase of this lot's auction at `now`.
    pub fn phase(&self, now: DateTime<Utc>) -> AuctionPhase {
        AuctionPhase::of(self.end_date, now)
    }

    /// Ended but still flagged as monitored: the monitoring flow's work list.
    pub fn needs_final_price(&self, now: DateTime<Utc>) -> bool {
        self.is_monitored && self.end_date.is_some_and(|end| end < now)
    }

    pub fn mark_archived(&mut self, location: String, at: DateTime<Utc>) {
        self.is_images_compressed = true;
        self.image_archive_url = Some(location);
        self.archived_at = Some(at);
    }

    pub fn clear_archive(&mut self) {
        self.is_images_compressed = false;
        self.image_archive_url = None;
        self.archived_at = None;
    }

    pub fn has_images(&self) -> bool {
        !self.image_urls.is_empty() || !self.thumbnail_urls.is_empty()
    }
}
