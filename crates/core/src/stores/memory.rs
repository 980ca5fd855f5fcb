use crate::error::StoreError;
use crate::store::{ChunkItem, TableSpec, TableStatus, STORE_BATCH_WRITE_LIMIT};
use crate::traits::ChunkStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryTable {
    items: HashMap<String, Vec<u8>>,
    pending_polls: u32,
}

/// Process-local [`ChunkStore`] for dry runs and tests.
///
/// Behaves like the real store for the parts the pipeline relies on:
/// duplicate creation reports `TableAlreadyExists`, new tables may take a
/// few status polls to become active, and individual keys can be marked as
/// permanently unprocessable.
#[derive(Debug, Default)]
pub struct InMemoryChunkStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
    rejected_keys: HashSet<String>,
    create_failure: Option<String>,
    activation_polls: u32,
    create_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `table` already present and active.
    pub fn with_existing_table(self, table: impl Into<String>) -> Self {
        self.lock_tables()
            .insert(table.into(), MemoryTable::default());
        self
    }

    /// Every write of these keys comes back unprocessed.
    pub fn with_rejected_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.rejected_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Table creation fails with a backend error carrying `details`.
    pub fn with_create_failure(mut self, details: impl Into<String>) -> Self {
        self.create_failure = Some(details.into());
        self
    }

    /// Newly created tables report `Creating` for this many status polls.
    pub fn with_activation_polls(mut self, polls: u32) -> Self {
        self.activation_polls = polls;
        self
    }

    pub fn item(&self, table: &str, key: &str) -> Option<Vec<u8>> {
        self.lock_tables()
            .get(table)
            .and_then(|stored| stored.items.get(key).cloned())
    }

    pub fn item_count(&self, table: &str) -> usize {
        self.lock_tables()
            .get(table)
            .map_or(0, |stored| stored.items.len())
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn lock_tables(&self) -> MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(details) = &self.create_failure {
            return Err(StoreError::backend("create_table", details));
        }

        let mut tables = self.lock_tables();
        if tables.contains_key(&spec.name) {
            return Err(StoreError::TableAlreadyExists(spec.name.clone()));
        }

        tables.insert(
            spec.name.clone(),
            MemoryTable {
                items: HashMap::new(),
                pending_polls: self.activation_polls,
            },
        );
        Ok(())
    }

    async fn table_status(&self, table: &str) -> Result<TableStatus, StoreError> {
        let mut tables = self.lock_tables();
        let Some(stored) = tables.get_mut(table) else {
            return Ok(TableStatus::Missing);
        };

        if stored.pending_polls > 0 {
            stored.pending_polls -= 1;
            return Ok(TableStatus::Creating);
        }

        Ok(TableStatus::Active)
    }

    async fn batch_put(&self, table: &str, items: &[ChunkItem]) -> Result<Vec<String>, StoreError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);

        if items.len() > STORE_BATCH_WRITE_LIMIT {
            return Err(StoreError::InvalidRequest {
                operation: "batch_put".to_string(),
                details: format!(
                    "{} items exceed the batch limit of {STORE_BATCH_WRITE_LIMIT}",
                    items.len()
                ),
            });
        }

        let mut tables = self.lock_tables();
        let stored = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        if stored.pending_polls > 0 {
            return Err(StoreError::backend(
                "batch_put",
                format!("table {table} is not active yet"),
            ));
        }

        let mut unprocessed = Vec::new();
        for item in items {
            if self.rejected_keys.contains(&item.chunk_id) {
                unprocessed.push(item.chunk_id.clone());
                continue;
            }
            stored.items.insert(item.chunk_id.clone(), item.text.clone());
        }

        Ok(unprocessed)
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryChunkStore;
    use crate::error::StoreError;
    use crate::store::{ChunkItem, TableSpec, TableStatus};
    use crate::traits::ChunkStore;

    fn item(key: &str) -> ChunkItem {
        ChunkItem {
            chunk_id: key.to_string(),
            text: key.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn duplicate_creation_reports_existing_table() {
        let store = InMemoryChunkStore::new();
        let spec = TableSpec::new("data", 5, 5);

        store.create_table(&spec).await.unwrap();
        let second = store.create_table(&spec).await;

        assert!(matches!(second, Err(StoreError::TableAlreadyExists(name)) if name == "data"));
        assert_eq!(store.create_calls(), 2);
    }

    #[tokio::test]
    async fn activation_takes_the_configured_polls() {
        let store = InMemoryChunkStore::new().with_activation_polls(2);
        store.create_table(&TableSpec::new("data", 5, 5)).await.unwrap();

        assert_eq!(store.table_status("data").await.unwrap(), TableStatus::Creating);
        assert_eq!(store.table_status("data").await.unwrap(), TableStatus::Creating);
        assert_eq!(store.table_status("data").await.unwrap(), TableStatus::Active);
        assert_eq!(store.table_status("other").await.unwrap(), TableStatus::Missing);
    }

    #[tokio::test]
    async fn rejected_keys_come_back_unprocessed() {
        let store = InMemoryChunkStore::new()
            .with_existing_table("data")
            .with_rejected_keys(["b"]);

        let unprocessed = store
            .batch_put("data", &[item("a"), item("b"), item("c")])
            .await
            .unwrap();

        assert_eq!(unprocessed, vec!["b".to_string()]);
        assert_eq!(store.item_count("data"), 2);
        assert_eq!(store.item("data", "a"), Some(b"a".to_vec()));
        assert_eq!(store.item("data", "b"), None);
    }

    #[tokio::test]
    async fn oversized_batches_are_refused() {
        let store = InMemoryChunkStore::new().with_existing_table("data");
        let items = (0..26).map(|i| item(&i.to_string())).collect::<Vec<_>>();

        let result = store.batch_put("data", &items).await;
        assert!(matches!(result, Err(StoreError::InvalidRequest { .. })));
        assert_eq!(store.item_count("data"), 0);
    }
}
