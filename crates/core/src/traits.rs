use crate::error::StoreError;
use crate::store::{ChunkItem, TableSpec, TableStatus};
use async_trait::async_trait;

#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Issues a create request. An existing table is reported as
    /// [`StoreError::TableAlreadyExists`].
    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError>;

    async fn table_status(&self, table: &str) -> Result<TableStatus, StoreError>;

    /// Writes `items` in one request and returns the keys the store left
    /// unprocessed. An `Err` means none of the items are known to be written.
    async fn batch_put(&self, table: &str, items: &[ChunkItem]) -> Result<Vec<String>, StoreError>;
}
