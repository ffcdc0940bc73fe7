//! Wire payloads returned by the marketplace API.
//!
//! These mirror the upstream JSON (camelCase) and are only ever read; the
//! upsert handler maps them onto [`super::Lot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream lot status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum LotStatus {
    /// Auction or listing still running.
    #[default]
    Active,
    /// Closed with at least one unit sold.
    Sold,
    /// Closed without a sale.
    Unsold,
    /// Withdrawn by the seller or the site.
    Withdrawn,
    /// A code this crate does not know about.
    Other(i32),
}

impl LotStatus {
    pub fn code(&self) -> i32 {
        match self {
            Self::Active => 0,
            Self::Sold => 1,
            Self::Unsold => 2,
            Self::Withdrawn => 3,
            Self::Other(code) => *code,
        }
    }

    /// Whether bidding is over (sold or unsold).
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Sold | Self::Unsold)
    }
}

impl From<i32> for LotStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Active,
            1 => Self::Sold,
            2 => Self::Unsold,
            3 => Self::Withdrawn,
            other => Self::Other(other),
        }
    }
}

impl From<LotStatus> for i32 {
    fn from(status: LotStatus) -> Self {
        status.code()
    }
}

/// Upstream listing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum LotType {
    #[default]
    Auction,
    FixedPrice,
    Other(i32),
}

impl LotType {
    pub fn code(&self) -> i32 {
        match self {
            Self::Auction => 0,
            Self::FixedPrice => 1,
            Self::Other(code) => *code,
        }
    }
}

impl From<i32> for LotType {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Auction,
            1 => Self::FixedPrice,
            other => Self::Other(other),
        }
    }
}

impl From<LotType> for i32 {
    fn from(lot_type: LotType) -> Self {
        lot_type.code()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerPayload {
    #[serde(default, alias = "login")]
    pub name: Option<String>,
}

/// One picture attached to a lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PicturePayload {
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Width / height.
    #[serde(default)]
    pub ratio: Option<f64>,
}

/// A lot as returned by the "get lot by id" endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotPayload {
    pub id: i64,
    #[serde(alias = "title")]
    pub name: String,
    pub category_id: i64,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub begin_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub start_price: f64,
    #[serde(default)]
    pub final_price: Option<f64>,
    #[serde(default)]
    pub seller: Option<SellerPayload>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, rename = "type")]
    pub lot_type: LotType,
    #[serde(default)]
    pub status: LotStatus,
    #[serde(default)]
    pub sold_quantity: i64,
    #[serde(default)]
    pub bids_count: i64,
    #[serde(default)]
    pub pics_count: Option<i64>,
    #[serde(default)]
    pub pictures: Vec<PicturePayload>,
}

impl LotPayload {
    /// Closed and nothing was sold.
    pub fn is_closed_without_sales(&self) -> bool {
        match self.status {
            LotStatus::Unsold => true,
            LotStatus::Sold => self.sold_quantity == 0,
            _ => false,
        }
    }

    /// Closed with at least one unit sold.
    pub fn is_closed_with_sales(&self) -> bool {
        self.status.is_closed() && self.sold_quantity > 0
    }

    /// The upstream site's implicit "worth tracking" signal: a one-unit
    /// start price, or a closed lot that actually sold.
    pub fn is_worth_tracking(&self) -> bool {
        self.start_price == 1.0 || self.is_closed_with_sales()
    }

    pub fn seller_name(&self) -> Option<&str> {
        self.seller.as_ref().and_then(|s| s.name.as_deref())
    }

    pub fn image_urls(&self) -> Vec<String> {
        self.pictures.iter().map(|p| p.url.clone()).collect()
    }

    /// Thumbnail URLs in picture order; pictures without a thumbnail are skipped.
    pub fn thumbnail_urls(&self) -> Vec<String> {
        self.pictures
            .iter()
            .filter_map(|p| p.thumbnail.clone())
            .collect()
    }

    /// Aspect ratios parallel to [`Self::image_urls`]; unknown ratios are `0.0`.
    pub fn pics_ratio(&self) -> Vec<f64> {
        self.pictures
            .iter()
            .map(|p| p.ratio.unwrap_or(0.0))
            .collect()
    }

    pub fn pics_count(&self) -> i64 {
        self.pics_count.unwrap_or(self.pictures.len() as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotIdEntry {
    pub id: i64,
}

/// One page of the "lot list by filter" endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotIdPage {
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub lots: Vec<LotIdEntry>,
}

impl LotIdPage {
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.lots.iter().map(|l| l.id)
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}
