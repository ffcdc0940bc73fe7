//! Schema setup for the SQLite store.

use diesel_async::SimpleAsyncConnection;
use tracing::info;

use super::pool::SqlitePool;
use super::RepositoryError;

const SQLITE_SCHEMA: &str = include_str!("schema_sqlite.sql");

/// Create tables and indexes if they do not exist yet. Safe to run on
/// every start-up.
pub async fn run_migrations(database_url: &str) -> Result<(), RepositoryError> {
    let pool = SqlitePool::new(database_url);
    let mut conn = pool.get().await?;
    conn.batch_execute(SQLITE_SCHEMA).await?;
    info!("Database schema ready at {}", pool.database_url());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("lots.db").display());

        run_migrations(&url).await.unwrap();
        run_migrations(&url).await.unwrap();
    }
}
