//! Crawl orchestration: the discovery and monitoring flows.
//!
//! Both flows walk lots one at a time, check the cancellation signal
//! between lots (and between categories), and report progress as
//! [`CrawlEvent`]s. One lot failing never stops a run.

mod types;

pub use types::{CrawlEvent, CrawlPolicy, CrawlSummary, Decision, SkipReason};

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::models::Category;
use crate::repository::{LotQuery, RepositoryError};
use crate::services::upsert::{LotUpsertHandler, UpsertOptions};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("cannot list lots to monitor: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct CrawlOrchestrator {
    handler: Arc<LotUpsertHandler>,
    policy: CrawlPolicy,
}

async fn emit(events: &mpsc::Sender<CrawlEvent>, event: CrawlEvent) {
    // A dropped receiver only means nobody is watching.
    let _ = events.send(event).await;
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}

impl CrawlOrchestrator {
    pub fn new(handler: Arc<LotUpsertHandler>, policy: CrawlPolicy) -> Self {
        Self { handler, policy }
    }

    pub fn policy(&self) -> &CrawlPolicy {
        &self.policy
    }

    /// Find and persist lots not yet stored, category by category.
    pub async fn run_discovery(
        &self,
        category_ids: &[i64],
        cancel: &watch::Receiver<bool>,
        events: &mpsc::Sender<CrawlEvent>,
    ) -> Result<CrawlSummary, CrawlError> {
        let mut summary = CrawlSummary::default();
        let marketplace = self.handler.marketplace();

        'categories: for &category_id in category_ids {
            if is_cancelled(cancel) {
                summary.cancelled = true;
                break;
            }

            let listing = marketplace.get_lot_ids_for_category(category_id).await;
            let (category_name, ids) = match listing {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("Category {}: listing failed, moving on: {}", category_id, e);
                    continue;
                }
            };
            emit(
                events,
                CrawlEvent::CategoryStarted {
                    category_id,
                    category_name: category_name.clone(),
                    total: ids.len(),
                },
            )
            .await;

            let category = Category::new(category_id, category_name);
            for lot_id in ids {
                if is_cancelled(cancel) {
                    summary.cancelled = true;
                    break 'categories;
                }
                self.discover_lot(lot_id, &category, events, &mut summary)
                    .await;
            }
        }

        if summary.cancelled {
            info!("Discovery cancelled");
            emit(events, CrawlEvent::Cancelled).await;
        }
        info!("Discovery finished: {}", summary);
        emit(events, CrawlEvent::Finished).await;
        Ok(summary)
    }

    async fn discover_lot(
        &self,
        lot_id: i64,
        category: &Category,
        events: &mpsc::Sender<CrawlEvent>,
        summary: &mut CrawlSummary,
    ) {
        summary.seen += 1;
        emit(events, CrawlEvent::LotStarted { lot_id }).await;

        let skip = |reason: SkipReason| CrawlEvent::LotSkipped { lot_id, reason };

        match self.handler.repository().lot_exists(lot_id).await {
            Ok(true) => {
                summary.skipped_existing += 1;
                emit(events, skip(SkipReason::AlreadyStored)).await;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Lot {}: existence check failed: {}", lot_id, e);
                summary.failed += 1;
                emit(
                    events,
                    CrawlEvent::LotFailed {
                        lot_id,
                        error: e.to_string(),
                    },
                )
                .await;
                return;
            }
        }

        let Some(payload) = self.handler.marketplace().get_lot(lot_id).await else {
            summary.not_found += 1;
            emit(events, skip(SkipReason::NotFound)).await;
            return;
        };

        let decision = self.policy.classify(category.category_id, &payload);
        let Some(options) = decision.options() else {
            debug!("Lot {}: not worth tracking", lot_id);
            summary.skipped_untracked += 1;
            emit(events, skip(SkipReason::NotWorthTracking)).await;
            return;
        };

        match self.handler.upsert(&payload, category, options).await {
            Ok(_) => {
                summary.persisted += 1;
                match decision {
                    Decision::WithImages => summary.with_images += 1,
                    Decision::LessValuable => summary.less_valuable += 1,
                    _ => {}
                }
                emit(events, CrawlEvent::LotPersisted { lot_id, decision }).await;
            }
            Err(e) => {
                summary.failed += 1;
                emit(
                    events,
                    CrawlEvent::LotFailed {
                        lot_id,
                        error: e.to_string(),
                    },
                )
                .await;
            }
        }
    }

    /// Re-fetch every ended lot still flagged as monitored so its final
    /// price is captured and the flag cleared.
    pub async fn run_monitoring_pass(
        &self,
        cancel: &watch::Receiver<bool>,
        events: &mpsc::Sender<CrawlEvent>,
    ) -> Result<CrawlSummary, CrawlError> {
        let due = self
            .handler
            .repository()
            .query_lots(&LotQuery::ended_but_monitored(Utc::now()))
            .await?;

        info!("Monitoring {} ended lots", due.len());
        emit(events, CrawlEvent::MonitoringStarted { total: due.len() }).await;

        let mut summary = CrawlSummary::default();
        for lot in due {
            if is_cancelled(cancel) {
                summary.cancelled = true;
                break;
            }

            let lot_id = lot.id;
            summary.seen += 1;
            emit(events, CrawlEvent::LotStarted { lot_id }).await;

            let options = UpsertOptions {
                download_images: self.policy.monitor_images,
                is_less_valuable: lot.is_less_valuable,
            };
            let category = Category::new(lot.category_id, lot.category_name.clone());

            match self.handler.refresh(lot_id, Some(&category), options).await {
                Ok(Some(outcome)) => {
                    summary.persisted += 1;
                    let decision = if outcome.lot.is_less_valuable {
                        summary.less_valuable += 1;
                        Decision::LessValuable
                    } else if outcome.archived {
                        summary.with_images += 1;
                        Decision::WithImages
                    } else {
                        Decision::WithoutImages
                    };
                    emit(events, CrawlEvent::LotPersisted { lot_id, decision }).await;
                }
                Ok(None) => {
                    warn!("Lot {}: gone upstream, still monitored", lot_id);
                    summary.not_found += 1;
                    emit(
                        events,
                        CrawlEvent::LotSkipped {
                            lot_id,
                            reason: SkipReason::NotFound,
                        },
                    )
                    .await;
                }
                Err(e) => {
                    summary.failed += 1;
                    emit(
                        events,
                        CrawlEvent::LotFailed {
                            lot_id,
                            error: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        }

        if summary.cancelled {
            info!("Monitoring cancelled");
            emit(events, CrawlEvent::Cancelled).await;
        }
        info!("Monitoring finished: {}", summary);
        emit(events, CrawlEvent::Finished).await;
        Ok(summary)
    }
}
