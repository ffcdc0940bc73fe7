//! Stats command.

use chrono::Utc;
use console::style;

use lotwatch::config::Settings;
use lotwatch::repository::LotQuery;

use super::helpers::open_repository;

pub async fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    let repository = open_repository(settings).await?;

    let less_valuable = LotQuery {
        less_valuable: Some(true),
        ..LotQuery::all()
    };
    let rows = [
        ("Lots", LotQuery::all()),
        ("Monitored", LotQuery::monitored()),
        ("Ended, still monitored", LotQuery::ended_but_monitored(Utc::now())),
        ("Images archived", LotQuery::archived()),
        ("Less valuable", less_valuable),
    ];

    println!("{}", style(settings.database_url()).bold());
    for (label, query) in rows {
        let count = repository.count_lots(&query).await?;
        println!("  {:<24} {}", label, count);
    }
    Ok(())
}
