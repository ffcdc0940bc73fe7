//! Single-lot commands.

use console::style;

use lotwatch::config::Settings;
use lotwatch::services::year::extract_year;
use lotwatch::services::UpsertOptions;

use super::helpers::{build_handler, open_repository};

/// Fetch one lot by id and upsert it.
pub async fn cmd_lot(
    settings: &Settings,
    id: i64,
    images: bool,
    less_valuable: bool,
) -> anyhow::Result<()> {
    let repository = open_repository(settings).await?;
    let options = UpsertOptions {
        download_images: images,
        is_less_valuable: less_valuable,
    };
    let handler = build_handler(settings, repository, options.download_images)?;

    let Some(outcome) = handler.refresh(id, None, options).await? else {
        println!("{} Lot {} not found upstream", style("!").yellow(), id);
        return Ok(());
    };

    let lot = &outcome.lot;
    println!(
        "{} Lot {} {}: {}",
        style("✓").green(),
        lot.id,
        if outcome.created { "created" } else { "updated" },
        lot.title
    );
    println!("  Category:   {} ({})", lot.category_name, lot.category_id);
    println!("  Price:      {:.2}", lot.price);
    match lot.final_price {
        Some(price) => println!("  Final:      {:.2}", price),
        None if lot.is_monitored => println!("  Final:      {}", style("monitored").dim()),
        None => println!("  Final:      -"),
    }
    if let Some(year) = lot.year_published {
        println!("  Year:       {}", year);
    }
    if let Some(ref location) = lot.image_archive_url {
        println!("  Archive:    {}", location);
    } else if images && !lot.is_less_valuable {
        println!("  Archive:    {}", style("not stored").yellow());
    }
    Ok(())
}

/// Print the year extracted from free text.
pub fn cmd_year(text: &str) {
    match extract_year(text) {
        Some(year) => println!("{}", year),
        None => println!("{}", style("no year found").dim()),
    }
}
