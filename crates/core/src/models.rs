use crate::error::{ChunkWriteError, IngestError, IngestStage};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Plain text pulled out of a document, pages concatenated in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    text: String,
    page_count: usize,
}

impl ExtractedText {
    pub fn new(text: String, page_count: usize) -> Self {
        Self { text, page_count }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence_index: u64,
    pub key: String,
    pub payload: Vec<u8>,
}

impl Chunk {
    /// The payload as text, or `None` when a byte-exact cut split a character.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkWriteOutcome {
    Written { key: String, sequence_index: u64 },
    Failed(ChunkWriteError),
}

impl ChunkWriteOutcome {
    pub fn key(&self) -> &str {
        match self {
            Self::Written { key, .. } => key,
            Self::Failed(error) => &error.chunk_key,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub document_id: String,
    pub table: String,
    pub page_count: usize,
    pub extracted_bytes: usize,
    pub chunk_count: usize,
    pub written: usize,
    pub failures: Vec<ChunkWriteError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestionReport {
    pub fn failed_keys(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|failure| failure.chunk_key.clone())
            .collect()
    }
}

/// Terminal result of a single ingestion run.
#[derive(Debug)]
pub enum IngestOutcome {
    Success(IngestionReport),
    PartialFailure {
        report: IngestionReport,
        failed_keys: Vec<String>,
    },
    FatalError {
        stage: IngestStage,
        cause: IngestError,
    },
}

impl IngestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn report(&self) -> Option<&IngestionReport> {
        match self {
            Self::Success(report) | Self::PartialFailure { report, .. } => Some(report),
            Self::FatalError { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<IngestionReport, IngestError> {
        match self {
            Self::Success(report) => Ok(report),
            Self::PartialFailure { failed_keys, .. } => {
                Err(IngestError::PartialFailure { failed_keys })
            }
            Self::FatalError { cause, .. } => Err(cause),
        }
    }
}
