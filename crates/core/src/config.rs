use crate::chunking::ChunkingConfig;
use crate::error::IngestError;
use crate::store::{TableSpec, STORE_BATCH_WRITE_LIMIT};
use std::time::Duration;

pub const DEFAULT_TABLE_NAME: &str = "data";
pub const DEFAULT_CAPACITY_UNITS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_in_flight: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: STORE_BATCH_WRITE_LIMIT,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_in_flight: 4,
        }
    }
}

impl WriteOptions {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.batch_size == 0 || self.batch_size > STORE_BATCH_WRITE_LIMIT {
            return Err(IngestError::InvalidConfig(format!(
                "batch size must be between 1 and {STORE_BATCH_WRITE_LIMIT}, got {}",
                self.batch_size
            )));
        }
        if self.max_attempts == 0 {
            return Err(IngestError::InvalidConfig(
                "max write attempts must be positive".to_string(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(IngestError::InvalidConfig(
                "max in-flight batches must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Everything one ingestion needs, handed to the pipeline at construction.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub table_name: String,
    pub read_capacity: i64,
    pub write_capacity: i64,
    pub chunking: ChunkingConfig,
    pub write: WriteOptions,
    pub provision: ProvisionOptions,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            read_capacity: DEFAULT_CAPACITY_UNITS,
            write_capacity: DEFAULT_CAPACITY_UNITS,
            chunking: ChunkingConfig::default(),
            write: WriteOptions::default(),
            provision: ProvisionOptions::default(),
        }
    }
}

impl IngestConfig {
    pub fn table_spec(&self) -> TableSpec {
        TableSpec::new(&self.table_name, self.read_capacity, self.write_capacity)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.table_name.trim().is_empty() {
            return Err(IngestError::InvalidConfig("table name is empty".to_string()));
        }
        if self.read_capacity <= 0 || self.write_capacity <= 0 {
            return Err(IngestError::InvalidConfig(format!(
                "capacity units must be positive, got read={} write={}",
                self.read_capacity, self.write_capacity
            )));
        }
        if self.provision.poll_interval.is_zero() {
            return Err(IngestError::InvalidConfig(
                "provision poll interval must be positive".to_string(),
            ));
        }
        self.chunking.validate()?;
        self.write.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_store_limits() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.table_name, "data");
        assert_eq!(config.chunking.max_chunk_size, 300_000);
        assert_eq!(config.write.batch_size, 25);
        assert_eq!(config.table_spec().partition_key, "chunk_id");
    }

    #[test]
    fn batch_size_above_store_limit_is_rejected() {
        let config = IngestConfig {
            write: WriteOptions {
                batch_size: 26,
                ..WriteOptions::default()
            },
            ..IngestConfig::default()
        };
        assert!(matches!(config.validate(), Err(IngestError::InvalidConfig(_))));
    }

    #[test]
    fn blank_table_name_is_rejected() {
        let config = IngestConfig {
            table_name: "  ".to_string(),
            ..IngestConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
