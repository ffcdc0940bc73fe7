//! Ingestion services: year extraction, lot upsert, image archiving and
//! the crawl flows that drive them.

pub mod archive;
pub mod crawl;
pub mod upsert;
pub mod year;

pub use archive::{ArchiveError, ArchiveOutcome, ImageArchiver, ImageFetcher};
pub use crawl::{CrawlError, CrawlEvent, CrawlOrchestrator, CrawlPolicy, CrawlSummary, Decision};
pub use upsert::{LotUpsertHandler, UpsertError, UpsertOptions, UpsertOutcome};
pub use year::extract_year;
