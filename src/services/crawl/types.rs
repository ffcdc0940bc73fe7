//! Crawl policy, events and run summaries.

use std::collections::HashSet;
use std::fmt;

use crate::models::LotPayload;
use crate::services::upsert::UpsertOptions;

/// Which categories get imagery and at what price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlPolicy {
    /// Categories whose tracked lots always get images.
    pub high_value_categories: HashSet<i64>,
    /// Categories where only lots at or above `price_threshold` get images.
    pub value_gated_categories: HashSet<i64>,
    pub price_threshold: f64,
    /// Whether the monitoring flow re-downloads images.
    pub monitor_images: bool,
}

impl CrawlPolicy {
    /// Decide how (and whether) a lot found under `category_id` is persisted.
    ///
    /// Order matters: a lot closed without sales is kept (without images)
    /// before the "worth tracking" gate is applied. The category groups match
    /// the category being walked, not the id the payload reports.
    pub fn classify(&self, category_id: i64, lot: &LotPayload) -> Decision {
        if lot.is_closed_without_sales() {
            return Decision::ClosedWithoutSales;
        }
        if !lot.is_worth_tracking() {
            return Decision::Skip;
        }
        if self.high_value_categories.contains(&category_id) {
            return Decision::WithImages;
        }
        if self.value_gated_categories.contains(&category_id) {
            return if lot.price >= self.price_threshold {
                Decision::WithImages
            } else {
                Decision::LessValuable
            };
        }
        Decision::WithoutImages
    }
}

/// Classification of one discovered lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Closed with zero sales: persisted, no images.
    ClosedWithoutSales,
    /// Persisted and archived.
    WithImages,
    /// Below the category threshold: persisted, flagged, never archived.
    LessValuable,
    /// Tracked, outside any image category.
    WithoutImages,
    /// Not worth tracking: not persisted.
    Skip,
}

impl Decision {
    /// Upsert flags, or `None` when the lot is not persisted.
    pub fn options(self) -> Option<UpsertOptions> {
        match self {
            Self::ClosedWithoutSales | Self::WithoutImages => Some(UpsertOptions::without_images()),
            Self::WithImages => Some(UpsertOptions::with_images()),
            Self::LessValuable => Some(UpsertOptions::less_valuable()),
            Self::Skip => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClosedWithoutSales => "closed without sales",
            Self::WithImages => "with images",
            Self::LessValuable => "less valuable",
            Self::WithoutImages => "without images",
            Self::Skip => "skipped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyStored,
    NotWorthTracking,
    NotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AlreadyStored => "already stored",
            Self::NotWorthTracking => "not worth tracking",
            Self::NotFound => "not found upstream",
        };
        f.write_str(s)
    }
}

/// Progress notifications from a running flow.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    CategoryStarted {
        category_id: i64,
        category_name: String,
        total: usize,
    },
    /// Monitoring flow picked up its work list.
    MonitoringStarted { total: usize },
    LotStarted { lot_id: i64 },
    LotPersisted { lot_id: i64, decision: Decision },
    LotSkipped { lot_id: i64, reason: SkipReason },
    LotFailed { lot_id: i64, error: String },
    Cancelled,
    Finished,
}

/// Counters for one flow run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub seen: usize,
    pub persisted: usize,
    pub with_images: usize,
    pub less_valuable: usize,
    pub skipped_existing: usize,
    pub skipped_untracked: usize,
    pub not_found: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl CrawlSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_existing + self.skipped_untracked + self.not_found
    }

    pub fn merge(&mut self, other: &CrawlSummary) {
        self.seen += other.seen;
        self.persisted += other.persisted;
        self.with_images += other.with_images;
        self.less_valuable += other.less_valuable;
        self.skipped_existing += other.skipped_existing;
        self.skipped_untracked += other.skipped_untracked;
        self.not_found += other.not_found;
        self.failed += other.failed;
        self.cancelled |= other.cancelled;
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seen, {} persisted ({} with images, {} less valuable), {} skipped, {} failed",
            self.seen,
            self.persisted,
            self.with_images,
            self.less_valuable,
            self.skipped(),
            self.failed
        )?;
        if self.cancelled {
            f.write_str(" [cancelled]")?;
        }
        Ok(())
    }
}
