//! Discovery and monitoring commands.

use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;

use lotwatch::config::Settings;
use lotwatch::repository::{BoxedLotRepository, InMemoryLotRepository};
use lotwatch::services::{CrawlOrchestrator, CrawlPolicy};

use super::helpers::{build_handler, cancel_on_ctrl_c, open_repository, print_summary};
use crate::cli::progress::CrawlProgress;

const EVENT_BUFFER: usize = 64;

/// Walk categories and store new lots.
pub async fn cmd_discover(
    settings: &Settings,
    category_ids: Vec<i64>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let category_ids = if category_ids.is_empty() {
        settings.categories.clone()
    } else {
        category_ids
    };
    if category_ids.is_empty() {
        anyhow::bail!("No categories given and crawl.categories is empty in the config");
    }

    let repository: BoxedLotRepository = if dry_run {
        println!(
            "{} Dry run: nothing is written and no images are archived",
            style("→").dim()
        );
        Arc::new(InMemoryLotRepository::new())
    } else {
        open_repository(settings).await?
    };

    let handler = build_handler(settings, repository, !dry_run)?;
    let orchestrator = CrawlOrchestrator::new(Arc::new(handler), settings.policy.clone());

    let cancel = cancel_on_ctrl_c();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let progress = CrawlProgress::new("Discovering lots...").attach(rx);

    let result = orchestrator.run_discovery(&category_ids, &cancel, &tx).await;
    drop(tx);
    let _ = progress.await;

    let summary = result?;
    print_summary("Discovery", &summary);
    Ok(())
}

/// Run one monitoring pass over ended lots.
pub async fn cmd_monitor(settings: &Settings, images: bool) -> anyhow::Result<()> {
    let repository = open_repository(settings).await?;

    let policy = CrawlPolicy {
        monitor_images: settings.policy.monitor_images || images,
        ..settings.policy.clone()
    };
    let handler = build_handler(settings, repository, policy.monitor_images)?;
    let orchestrator = CrawlOrchestrator::new(Arc::new(handler), policy);

    let cancel = cancel_on_ctrl_c();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let progress = CrawlProgress::new("Loading monitored lots...").attach(rx);

    let result = orchestrator.run_monitoring_pass(&cancel, &tx).await;
    drop(tx);
    let _ = progress.await;

    let summary = result?;
    print_summary("Monitoring", &summary);
    Ok(())
}
