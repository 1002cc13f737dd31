use super::engine::{Continuation, EntityStore, Page};
use super::filter::Filter;
use crate::core::{Entity, FactError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Default number of entities returned per page, matching the table
/// service's own page limit.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

type Key = (String, String);

/// In-process entity store.
///
/// Rows are kept ordered by `(PartitionKey, RowKey)`, which is also the
/// iteration order queries observe.
pub struct MemoryEntityStore {
    rows: RwLock<BTreeMap<Key, Entity>>,
    page_size: usize,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Store that splits query results into pages of `page_size` entities.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let rows = entities
            .into_iter()
            .map(|entity| (entity.key(), entity))
            .collect();
        Self {
            rows: RwLock::new(rows),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// All rows in key order.
    pub async fn entities(&self) -> Vec<Entity> {
        self.rows.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(partition: &str, row_key: &str) -> String {
    format!("Entity {}/{}", partition, row_key)
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn query_page(&self, filter: &Filter, continuation: Option<Continuation>) -> Result<Page> {
        let rows = self.rows.read().await;
        let pinned = filter.pinned_partition();

        let start: Key = match continuation {
            Some(c) => (c.next_partition_key, c.next_row_key.unwrap_or_default()),
            None => (pinned.unwrap_or_default().to_string(), String::new()),
        };

        let mut page = Page::default();
        for (key, entity) in rows.range(start..) {
            if pinned.is_some_and(|pk| key.0 != pk) {
                break;
            }
            if !filter.matches(entity) {
                continue;
            }
            if page.entities.len() == self.page_size {
                page.continuation = Some(Continuation {
                    next_partition_key: key.0.clone(),
                    next_row_key: Some(key.1.clone()),
                });
                break;
            }
            page.entities.push(entity.clone());
        }

        Ok(page)
    }

    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<Entity>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(partition.to_string(), row_key.to_string())).cloned())
    }

    async fn create(&self, entity: Entity) -> Result<()> {
        let mut rows = self.rows.write().await;
        let key = entity.key();
        if rows.contains_key(&key) {
            return Err(FactError::AlreadyExists(describe(&key.0, &key.1)));
        }
        rows.insert(key, entity);
        Ok(())
    }

    async fn update(&self, entity: Entity) -> Result<()> {
        let mut rows = self.rows.write().await;
        let key = entity.key();
        match rows.get_mut(&key) {
            Some(slot) => {
                *slot = entity;
                Ok(())
            }
            None => Err(FactError::NotFound(describe(&key.0, &key.1))),
        }
    }

    async fn delete(&self, partition: &str, row_key: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        if rows.remove(&(partition.to_string(), row_key.to_string())).is_none() {
            return Err(FactError::NotFound(describe(partition, row_key)));
        }
        Ok(())
    }
}
