//! Shared helper functions for CLI commands.

use std::sync::Arc;

use console::style;
use tokio::sync::watch;

use lotwatch::config::Settings;
use lotwatch::repository::BoxedLotRepository;
use lotwatch::services::{CrawlSummary, LotUpsertHandler};

/// Open the SQLite repository, refusing to run before `init`.
pub async fn open_repository(settings: &Settings) -> anyhow::Result<BoxedLotRepository> {
    if !settings.database_exists() {
        anyhow::bail!(
            "No database at {}. Run 'lotwatch init' first.",
            settings.database_path().display()
        );
    }
    Ok(Arc::new(settings.open_repository().await?))
}

/// Wire session, marketplace and (optionally) the image archiver around a
/// repository.
pub fn build_handler(
    settings: &Settings,
    repository: BoxedLotRepository,
    with_archiver: bool,
) -> anyhow::Result<LotUpsertHandler> {
    let user_agent = settings.resolved_user_agent();
    let session = Arc::new(settings.session_client(&user_agent)?);
    let marketplace = Arc::new(settings.marketplace(session.clone()));

    let mut handler = LotUpsertHandler::new(repository, marketplace);
    if with_archiver {
        let archiver = settings.image_archiver(&session, &user_agent)?;
        tracing::info!("Archiving images to {} storage", archiver.storage_name());
        handler = handler.with_archiver(Arc::new(archiver));
    }
    Ok(handler)
}

/// Cancellation signal flipped by Ctrl-C.
pub fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{} Stopping after the current lot...",
                style("!").yellow()
            );
            let _ = tx.send(true);
        }
    });
    rx
}

pub fn print_summary(label: &str, summary: &CrawlSummary) {
    let marker = if summary.cancelled {
        style("!").yellow()
    } else if summary.failed > 0 {
        style("✗").red()
    } else {
        style("✓").green()
    };
    println!("{} {}: {}", marker, label, summary);
}
