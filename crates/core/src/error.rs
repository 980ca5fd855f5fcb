use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage a fatal error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Extraction,
    Provisioning,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extraction => "extraction",
            Self::Provisioning => "provisioning",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("table provisioning failed for {table}: {details}")]
    Provisioning { table: String, details: String },

    #[error("{} chunk(s) failed to persist", .failed_keys.len())]
    PartialFailure { failed_keys: Vec<String> },

    #[error("ingestion cancelled during {0}")]
    Cancelled(IngestStage),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// A chunk that could not be persisted after the writer exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("chunk {chunk_key} failed to persist: {reason}")]
pub struct ChunkWriteError {
    pub chunk_key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("invalid request to {operation}: {details}")]
    InvalidRequest { operation: String, details: String },

    #[error("{operation} failed: {details}")]
    Backend { operation: String, details: String },
}

impl StoreError {
    pub fn backend(operation: impl Into<String>, details: impl ToString) -> Self {
        Self::Backend {
            operation: operation.into(),
            details: details.to_string(),
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
