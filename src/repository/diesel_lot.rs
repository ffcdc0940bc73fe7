//! Diesel-based lot repository for SQLite.
//!
//! Uses diesel-async's SyncConnectionWrapper to provide an async interface
//! while keeping Diesel's compile-time query checking.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use diesel_async::RunQueryDsl;

use super::diesel_models::{CategoryRecord, LotRecord, NewCategory, NewLotRecord};
use super::pool::SqlitePool;
use super::{format_datetime, LotQuery, LotRepository, RepositoryError};
use crate::models::{Category, Lot};
use crate::schema::{categories, lots};
use crate::with_conn;

/// Apply a [`LotQuery`]'s filters to any boxed `lots` query.
fn filtered<'a, ST: 'a>(
    mut query: lots::BoxedQuery<'a, Sqlite, ST>,
    filter: &LotQuery,
) -> lots::BoxedQuery<'a, Sqlite, ST> {
    if let Some(monitored) = filter.monitored {
        query = query.filter(lots::is_monitored.eq(monitored));
    }
    if let Some(before) = filter.ended_before {
        query = query
            .filter(lots::end_date.is_not_null())
            .filter(lots::end_date.lt(format_datetime(&before)));
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(lots::category_id.eq(category_id));
    }
    if let Some(compressed) = filter.images_compressed {
        query = query.filter(lots::is_images_compressed.eq(compressed));
    }
    if let Some(less_valuable) = filter.less_valuable {
        query = query.filter(lots::is_less_valuable.eq(less_valuable));
    }
    query
}

/// SQLite-backed [`LotRepository`].
#[derive(Clone)]
pub struct DieselLotRepository {
    pool: SqlitePool,
}

impl DieselLotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(SqlitePool::from_path(path))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LotRepository for DieselLotRepository {
    async fn find_lot(&self, id: i64) -> Result<Option<Lot>, RepositoryError> {
        with_conn!(self.pool, conn => {
            let record = lots::table
                .find(id)
                .select(LotRecord::as_select())
                .first::<LotRecord>(&mut conn)
                .await
                .optional()?;
            Ok(record.map(Lot::from))
        })
    }

    async fn lot_exists(&self, id: i64) -> Result<bool, RepositoryError> {
        with_conn!(self.pool, conn => {
            let count: i64 = lots::table
                .filter(lots::id.eq(id))
                .select(count_star())
                .first(&mut conn)
                .await?;
            Ok(count > 0)
        })
    }

    async fn upsert_lot(&self, lot: &Lot) -> Result<(), RepositoryError> {
        let record = NewLotRecord::try_from(lot)?;
        with_conn!(self.pool, conn => {
            diesel::replace_into(lots::table)
                .values(&record)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    async fn find_or_create_category(
        &self,
        category_id: i64,
        name: &str,
    ) -> Result<Category, RepositoryError> {
        let created_at = format_datetime(&Utc::now());
        with_conn!(self.pool, conn => {
            diesel::insert_or_ignore_into(categories::table)
                .values(&NewCategory {
                    category_id,
                    name,
                    created_at: &created_at,
                })
                .execute(&mut conn)
                .await?;

            let record = categories::table
                .find(category_id)
                .select(CategoryRecord::as_select())
                .first::<CategoryRecord>(&mut conn)
                .await?;
            Ok(Category::from(record))
        })
    }

    async fn query_lots(&self, query: &LotQuery) -> Result<Vec<Lot>, RepositoryError> {
        let mut statement = filtered(
            lots::table.select(LotRecord::as_select()).into_boxed(),
            query,
        )
        .order((lots::end_date.asc(), lots::id.asc()));
        if let Some(limit) = query.limit {
            statement = statement.limit(limit);
        }

        with_conn!(self.pool, conn => {
            let records = statement.load::<LotRecord>(&mut conn).await?;
            Ok(records.into_iter().map(Lot::from).collect())
        })
    }

    async fn count_lots(&self, query: &LotQuery) -> Result<u64, RepositoryError> {
        let statement = filtered(lots::table.select(count_star()).into_boxed(), query);
        with_conn!(self.pool, conn => {
            let count: i64 = statement.first(&mut conn).await?;
            Ok(count.max(0) as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LotStatus, LotType};
    use crate::repository::migrations;
    use chrono::{DateTime, Duration};
    use tempfile::tempdir;

    async fn setup_test_db() -> (tempfile::TempDir, DieselLotRepository) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lots.db");
        let db_url = format!("sqlite:{}", db_path.display());
        migrations::run_migrations(&db_url).await.unwrap();
        (dir, DieselLotRepository::from_path(&db_path))
    }

    fn sample_lot(id: i64, end_date: Option<DateTime<Utc>>, monitored: bool) -> Lot {
        Lot {
            id,
            category_id: 44,
            category_name: "Антикварные книги".to_string(),
            title: "Сочинения".to_string(),
            normalized_title: "сочинения".to_string(),
            description: String::new(),
            normalized_description: String::new(),
            begin_date: end_date.map(|d| d - Duration::days(7)),
            end_date,
            price: 1500.0,
            start_price: 1.0,
            final_price: None,
            year_published: Some(1887),
            seller_name: Some("bookman".to_string()),
            city: None,
            lot_type: LotType::Auction,
            status: LotStatus::Active,
            sold_quantity: 0,
            bids_count: 3,
            pics_count: 2,
            image_urls: vec!["https://img/1.jpg".into(), "https://img/2.jpg".into()],
            thumbnail_urls: vec!["https://img/t1.jpg".into()],
            pics_ratio: vec![0.75, 1.0],
            is_monitored: monitored,
            is_less_valuable: false,
            is_images_compressed: false,
            image_archive_url: None,
            archived_at: None,
            first_seen_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_and_find_round_trip() {
        let (_dir, repo) = setup_test_db().await;
        let lot = sample_lot(1, Some(Utc::now() + Duration::days(1)), true);

        repo.upsert_lot(&lot).await.unwrap();
        let loaded = repo.find_lot(1).await.unwrap().unwrap();

        assert_eq!(loaded.title, lot.title);
        assert_eq!(loaded.image_urls, lot.image_urls);
        assert_eq!(loaded.pics_ratio, lot.pics_ratio);
        assert_eq!(loaded.year_published, Some(1887));
        assert!(loaded.is_monitored);
        assert!(repo.lot_exists(1).await.unwrap());
        assert!(!repo.lot_exists(2).await.unwrap());
        assert!(repo.find_lot(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_every_field() {
        let (_dir, repo) = setup_test_db().await;
        let mut lot = sample_lot(1, Some(Utc::now() + Duration::days(1)), true);
        repo.upsert_lot(&lot).await.unwrap();

        lot.title = "Другое".to_string();
        lot.image_urls.clear();
        lot.mark_archived("/archive/1.zip".to_string(), Utc::now());
        repo.upsert_lot(&lot).await.unwrap();

        let loaded = repo.find_lot(1).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Другое");
        assert!(loaded.image_urls.is_empty());
        assert_eq!(loaded.image_archive_url.as_deref(), Some("/archive/1.zip"));
        assert_eq!(repo.count_lots(&LotQuery::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn category_keeps_first_name() {
        let (_dir, repo) = setup_test_db().await;

        let first = repo.find_or_create_category(44, "Книги").await.unwrap();
        let second = repo.find_or_create_category(44, "Переименовано").await.unwrap();

        assert_eq!(first.name, "Книги");
        assert_eq!(second.name, "Книги");
    }

    #[tokio::test]
    async fn ended_but_monitored_query() {
        let (_dir, repo) = setup_test_db().await;
        let now = Utc::now();

        repo.upsert_lot(&sample_lot(1, Some(now - Duration::hours(2)), true))
            .await
            .unwrap();
        repo.upsert_lot(&sample_lot(2, Some(now - Duration::hours(5)), true))
            .await
            .unwrap();
        repo.upsert_lot(&sample_lot(3, Some(now + Duration::hours(1)), true))
            .await
            .unwrap();
        repo.upsert_lot(&sample_lot(4, Some(now - Duration::hours(1)), false))
            .await
            .unwrap();
        repo.upsert_lot(&sample_lot(5, None, true)).await.unwrap();

        let due = repo
            .query_lots(&LotQuery::ended_but_monitored(now))
            .await
            .unwrap();
        let ids: Vec<i64> = due.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![2, 1]);

        assert_eq!(repo.count_lots(&LotQuery::monitored()).await.unwrap(), 4);
        assert_eq!(
            repo.count_lots(&LotQuery::ended_but_monitored(now))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            repo.query_lots(&LotQuery::all().with_limit(2))
                .await
                .unwrap()
                .len(),
            2
        );
    }
}
