use crate::models::Chunk;
use std::fmt;

/// Hard ceiling the store places on a single item, key and attributes included.
pub const STORE_ITEM_LIMIT_BYTES: usize = 400_000;

/// Most put requests the store accepts in one batch write.
pub const STORE_BATCH_WRITE_LIMIT: usize = 25;

pub const PARTITION_KEY_ATTRIBUTE: &str = "chunk_id";
pub const TEXT_ATTRIBUTE: &str = "text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub partition_key: String,
    pub read_capacity: i64,
    pub write_capacity: i64,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, read_capacity: i64, write_capacity: i64) -> Self {
        Self {
            name: name.into(),
            partition_key: PARTITION_KEY_ATTRIBUTE.to_string(),
            read_capacity,
            write_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Missing,
    Creating,
    Active,
    /// Capacity or index change in progress; the table keeps serving writes.
    Updating,
    Other(String),
}

impl TableStatus {
    pub fn accepts_writes(&self) -> bool {
        matches!(self, Self::Active | Self::Updating)
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("MISSING"),
            Self::Creating => f.write_str("CREATING"),
            Self::Active => f.write_str("ACTIVE"),
            Self::Updating => f.write_str("UPDATING"),
            Self::Other(status) => f.write_str(status),
        }
    }
}

/// One persisted row: `{ chunk_id, text }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkItem {
    pub chunk_id: String,
    pub text: Vec<u8>,
}

impl From<&Chunk> for ChunkItem {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.key.clone(),
            text: chunk.payload.clone(),
        }
    }
}
