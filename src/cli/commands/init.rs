//! Initialize command.

use console::style;

use lotwatch::config::Settings;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    settings.open_repository().await?;

    println!(
        "{} Initialized lotwatch database at {}",
        style("✓").green(),
        settings.database_url()
    );
    if settings.archive.use_local_files {
        println!(
            "  {} Archives go to {}",
            style("→").dim(),
            settings.archive.local_root.display()
        );
    }
    if settings.categories.is_empty() {
        println!(
            "{} No categories configured; add crawl.categories to lotwatch.toml",
            style("!").yellow()
        );
    }

    Ok(())
}
