//! In-memory ItemStore implementation.
//!
//! Paging mirrors DynamoDB: a page that fills its limit always carries a
//! last-evaluated key, even when nothing follows it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Item, ItemKey, ItemStore, PutCondition, QueryPage, RangeQuery, Result, StorageError};

/// In-memory sorted item store.
#[derive(Default)]
pub struct MockItemStore {
    items: RwLock<BTreeMap<ItemKey, Item>>,
    page_size: RwLock<Option<usize>>,
    fail_on_get: RwLock<bool>,
    fail_on_put: RwLock<bool>,
    fail_on_query: RwLock<bool>,
    fail_queries_after: RwLock<Option<usize>>,
    queries: AtomicUsize,
}

impl MockItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose range reads never return more than `page_size` items.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: RwLock::new(Some(page_size)),
            ..Self::default()
        }
    }

    pub async fn set_page_size(&self, page_size: Option<usize>) {
        *self.page_size.write().await = page_size;
    }

    pub async fn set_fail_on_get(&self, fail: bool) {
        *self.fail_on_get.write().await = fail;
    }

    pub async fn set_fail_on_put(&self, fail: bool) {
        *self.fail_on_put.write().await = fail;
    }

    pub async fn set_fail_on_query(&self, fail: bool) {
        *self.fail_on_query.write().await = fail;
    }

    /// Let `successes` more range reads through, then fail every one after.
    pub async fn fail_queries_after(&self, successes: usize) {
        let base = self.queries.load(Ordering::SeqCst);
        *self.fail_queries_after.write().await = Some(base + successes);
    }

    /// Number of range reads served or attempted so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub async fn stored_count(&self) -> usize {
        self.items.read().await.len()
    }

    /// All items of a partition, in sort order.
    pub async fn partition_items(&self, partition: &str) -> Vec<Item> {
        self.items
            .read()
            .await
            .values()
            .filter(|item| item.key.partition == partition)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ItemStore for MockItemStore {
    async fn get(&self, key: &ItemKey) -> Result<Option<Item>> {
        if *self.fail_on_get.read().await {
            return Err(StorageError::Unavailable(format!("get {}", key)));
        }
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn put(&self, item: Item) -> Result<()> {
        if *self.fail_on_put.read().await {
            return Err(StorageError::Unavailable(format!("put {}", item.key)));
        }
        debug!(key = %item.key, "Stored item in memory");
        self.items.write().await.insert(item.key.clone(), item);
        Ok(())
    }

    async fn conditional_put(&self, item: Item, condition: PutCondition) -> Result<()> {
        if *self.fail_on_put.read().await {
            return Err(StorageError::Unavailable(format!("put {}", item.key)));
        }
        // Check and write under one lock, like the backend's atomic condition.
        let mut items = self.items.write().await;
        if !condition.holds(items.get(&item.key)) {
            return Err(StorageError::ConditionFailed(item.key));
        }
        debug!(key = %item.key, "Stored item in memory (conditional)");
        items.insert(item.key.clone(), item);
        Ok(())
    }

    async fn query_range(&self, query: RangeQuery) -> Result<QueryPage> {
        let attempt = self.queries.fetch_add(1, Ordering::SeqCst);
        if *self.fail_on_query.read().await {
            return Err(StorageError::Unavailable(format!(
                "query {}",
                query.partition
            )));
        }
        if let Some(limit) = *self.fail_queries_after.read().await {
            if attempt >= limit {
                return Err(StorageError::Unavailable(format!(
                    "query {} (attempt {})",
                    query.partition, attempt
                )));
            }
        }

        let lower = query.effective_lower();
        if lower > query.upper {
            return Ok(QueryPage::default());
        }

        let page_size = *self.page_size.read().await;
        let limit = match (query.limit, page_size) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
        .map(|n| n.max(1));

        let items = self.items.read().await;
        let range = ItemKey::new(query.partition.clone(), lower)
            ..=ItemKey::new(query.partition.clone(), query.upper);
        let page: Vec<Item> = items
            .range(range)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, item)| item.clone())
            .collect();

        let last_evaluated = match limit {
            Some(n) if page.len() == n => page.last().map(|item| item.key.clone()),
            _ => None,
        };

        Ok(QueryPage {
            items: page,
            last_evaluated,
        })
    }
}

#[cfg(test)]
mod tests;
