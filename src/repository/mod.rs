//! Persistence for lots and categories.
//!
//! [`LotRepository`] is the contract the pipeline writes through. Two
//! implementations ship with the crate: [`DieselLotRepository`] (SQLite)
//! and [`InMemoryLotRepository`] (tests and dry runs).

mod diesel_lot;
mod diesel_models;
mod memory;
pub mod migrations;
pub mod pool;

pub use diesel_lot::DieselLotRepository;
pub use diesel_models::{CategoryRecord, LotRecord, NewCategory, NewLotRecord};
pub use memory::InMemoryLotRepository;
pub use pool::{DbError, SqlitePool};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::models::{Category, Lot};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Predicate over persisted lots. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotQuery {
    pub monitored: Option<bool>,
    /// Only lots whose end date is strictly before this instant.
    pub ended_before: Option<DateTime<Utc>>,
    pub category_id: Option<i64>,
    pub images_compressed: Option<bool>,
    pub less_valuable: Option<bool>,
    pub limit: Option<i64>,
}

impl LotQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// The monitoring flow's work list.
    pub fn ended_but_monitored(now: DateTime<Utc>) -> Self {
        Self {
            monitored: Some(true),
            ended_before: Some(now),
            ..Self::default()
        }
    }

    pub fn monitored() -> Self {
        Self {
            monitored: Some(true),
            ..Self::default()
        }
    }

    pub fn archived() -> Self {
        Self {
            images_compressed: Some(true),
            ..Self::default()
        }
    }

    pub fn in_category(category_id: i64) -> Self {
        Self {
            category_id: Some(category_id),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the predicate in memory (limit excluded).
    pub fn matches(&self, lot: &Lot) -> bool {
        self.monitored.is_none_or(|m| lot.is_monitored == m)
            && self
                .ended_before
                .is_none_or(|t| lot.end_date.is_some_and(|end| end < t))
            && self.category_id.is_none_or(|c| lot.category_id == c)
            && self
                .images_compressed
                .is_none_or(|c| lot.is_images_compressed == c)
            && self.less_valuable.is_none_or(|l| lot.is_less_valuable == l)
    }
}

/// Lot and category storage.
///
/// Writes are last-write-wins per lot id; the store does no cross-call
/// locking, so callers must not run two flows over the same id at once.
#[async_trait]
pub trait LotRepository: Send + Sync {
    async fn find_lot(&self, id: i64) -> Result<Option<Lot>, RepositoryError>;

    async fn lot_exists(&self, id: i64) -> Result<bool, RepositoryError>;

    /// Insert, or overwrite every column of an existing row.
    async fn upsert_lot(&self, lot: &Lot) -> Result<(), RepositoryError>;

    /// Existing category, or a new one with `name`. Never renames.
    async fn find_or_create_category(
        &self,
        category_id: i64,
        name: &str,
    ) -> Result<Category, RepositoryError>;

    /// Matching lots ordered by end date, then id.
    async fn query_lots(&self, query: &LotQuery) -> Result<Vec<Lot>, RepositoryError>;

    async fn count_lots(&self, query: &LotQuery) -> Result<u64, RepositoryError>;
}

/// Shared repository trait object.
pub type BoxedLotRepository = Arc<dyn LotRepository>;

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime string from the database.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
