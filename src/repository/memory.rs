//! In-process lot store for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LotQuery, LotRepository, RepositoryError};
use crate::models::{Category, Lot};

#[derive(Default)]
pub struct InMemoryLotRepository {
    lots: RwLock<HashMap<i64, Lot>>,
    categories: RwLock<HashMap<i64, Category>>,
    fail_writes: AtomicBool,
}

impl InMemoryLotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise persistence errors.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.lots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lots.read().await.is_empty()
    }

    pub async fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<_> = self.categories.read().await.values().cloned().collect();
        categories.sort_by_key(|c| c.category_id);
        categories
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LotRepository for InMemoryLotRepository {
    async fn find_lot(&self, id: i64) -> Result<Option<Lot>, RepositoryError> {
        Ok(self.lots.read().await.get(&id).cloned())
    }

    async fn lot_exists(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.lots.read().await.contains_key(&id))
    }

    async fn upsert_lot(&self, lot: &Lot) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.lots.write().await.insert(lot.id, lot.clone());
        Ok(())
    }

    async fn find_or_create_category(
        &self,
        category_id: i64,
        name: &str,
    ) -> Result<Category, RepositoryError> {
        self.check_writable()?;
        let mut categories = self.categories.write().await;
        Ok(categories
            .entry(category_id)
            .or_insert_with(|| Category::new(category_id, name))
            .clone())
    }

    async fn query_lots(&self, query: &LotQuery) -> Result<Vec<Lot>, RepositoryError> {
        let lots = self.lots.read().await;
        let mut matched: Vec<Lot> = lots.values().filter(|l| query.matches(l)).cloned().collect();
        // NULL end dates first, like SQLite's ascending order
        matched.sort_by(|a, b| a.end_date.cmp(&b.end_date).then(a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            matched.truncate(limit.max(0) as usize);
        }
        Ok(matched)
    }

    async fn count_lots(&self, query: &LotQuery) -> Result<u64, RepositoryError> {
        let lots = self.lots.read().await;
        Ok(lots.values().filter(|l| query.matches(l)).count() as u64)
    }
}
