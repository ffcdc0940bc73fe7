//! lotwatch - auction lot ingestion and post-auction price tracking.
//!
//! Crawls a marketplace's antiquarian book categories, persists every lot worth
//! tracking, archives its imagery and keeps re-checking open auctions until the
//! final sale price is known.

pub mod config;
pub mod http_client;
pub mod marketplace;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;
pub mod utils;
