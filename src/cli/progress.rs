//! Spinner display driven by crawl events.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use lotwatch::services::CrawlEvent;

/// Renders [`CrawlEvent`]s from one flow onto a spinner.
pub struct CrawlProgress {
    bar: ProgressBar,
    scope: String,
    done: usize,
    total: usize,
}

impl CrawlProgress {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        bar.set_message(label.to_string());

        Self {
            bar,
            scope: label.to_string(),
            done: 0,
            total: 0,
        }
    }

    /// Consume events until the flow finishes or the sender is dropped.
    pub fn attach(mut self, mut events: mpsc::Receiver<CrawlEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if self.handle(event) {
                    break;
                }
            }
            self.bar.finish_and_clear();
        })
    }

    /// Returns true once the flow is finished.
    fn handle(&mut self, event: CrawlEvent) -> bool {
        match event {
            CrawlEvent::CategoryStarted {
                category_id,
                category_name,
                total,
            } => {
                self.scope = format!("{} ({})", category_name, category_id);
                self.done = 0;
                self.total = total;
                self.bar.set_message(format!("{}: {} lots", self.scope, total));
            }
            CrawlEvent::MonitoringStarted { total } => {
                self.scope = "Monitoring".to_string();
                self.done = 0;
                self.total = total;
                self.bar.set_message(format!("Monitoring {} ended lots", total));
            }
            CrawlEvent::LotStarted { lot_id } => {
                self.done += 1;
                self.bar.set_message(format!(
                    "{}: lot {} [{}/{}]",
                    self.scope, lot_id, self.done, self.total
                ));
            }
            CrawlEvent::LotPersisted { lot_id, decision } => {
                self.bar.println(format!(
                    "  {} Lot {} stored {}",
                    style("✓").green(),
                    lot_id,
                    style(decision).dim()
                ));
            }
            CrawlEvent::LotSkipped { .. } => {}
            CrawlEvent::LotFailed { lot_id, error } => {
                self.bar.println(format!(
                    "  {} Lot {}: {}",
                    style("✗").red(),
                    lot_id,
                    error
                ));
            }
            CrawlEvent::Cancelled => {
                self.bar
                    .println(format!("{} Cancelled, finishing up", style("!").yellow()));
            }
            CrawlEvent::Finished => return true,
        }
        false
    }
}
