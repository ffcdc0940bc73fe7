//! SQLite connection factory.
//!
//! SQLite connections are cheap and file-based, so a connection is
//! established per operation rather than pooled. `SyncConnectionWrapper`
//! runs the blocking driver on tokio's blocking pool.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::AsyncConnection;

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// Lightweight SQLite "pool": remembers the URL, connects on demand.
#[derive(Clone, Debug)]
pub struct SqlitePool {
    database_url: String,
}

impl SqlitePool {
    pub fn new(database_url: &str) -> Self {
        // diesel expects a bare path
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    pub async fn get(&self) -> Result<SqliteConn, super::RepositoryError> {
        SqliteConn::establish(&self.database_url)
            .await
            .map_err(|e| super::RepositoryError::Connection(e.to_string()))
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Run a block with a fresh connection bound to `$conn`.
///
/// ```ignore
/// with_conn!(self.pool, conn => {
///     lots::table.find(id).first::<LotRecord>(&mut conn).await
/// })
/// ```
#[macro_export]
macro_rules! with_conn {
    ($pool:expr, $conn:ident => $body:expr) => {{
        let mut $conn = $pool.get().await?;
        $body
    }};
}

#[allow(unused_imports)]
pub use with_conn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sqlite_prefix() {
        assert_eq!(SqlitePool::new("sqlite:/tmp/lots.db").database_url(), "/tmp/lots.db");
        assert_eq!(SqlitePool::new("/tmp/lots.db").database_url(), "/tmp/lots.db");
        assert_eq!(
            SqlitePool::from_path(Path::new("/data/lotwatch.db")).database_url(),
            "/data/lotwatch.db"
        );
    }
}
