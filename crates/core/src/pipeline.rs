use crate::cancel::CancellationFlag;
use crate::chunking::build_chunks;
use crate::config::IngestConfig;
use crate::error::{IngestError, IngestStage};
use crate::extractor::TextExtractor;
use crate::keys::DocumentId;
use crate::models::{ChunkWriteOutcome, IngestOutcome, IngestionReport};
use crate::provision::TableProvisioner;
use crate::traits::ChunkStore;
use crate::writer::BatchWriter;
use chrono::Utc;
use std::io::Read;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{error, info, warn};

/// Extract → partition → derive keys → provision → write, for one document at a time.
///
/// Holds no per-document state; a single pipeline can serve concurrent
/// ingestions. On a multi-threaded runtime extraction runs through
/// `block_in_place`; elsewhere it runs inline on the calling thread.
pub struct IngestionPipeline {
    config: IngestConfig,
    extractor: Arc<dyn TextExtractor>,
    provisioner: TableProvisioner,
    writer: BatchWriter,
}

impl IngestionPipeline {
    pub fn new(
        config: IngestConfig,
        extractor: Arc<dyn TextExtractor>,
        store: Arc<dyn ChunkStore>,
    ) -> Result<Self, IngestError> {
        config.validate()?;

        Ok(Self {
            provisioner: TableProvisioner::new(store.clone(), config.provision),
            writer: BatchWriter::new(store, config.write),
            extractor,
            config,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn provisioner(&self) -> &TableProvisioner {
        &self.provisioner
    }

    pub async fn ingest(
        &self,
        document: &mut (dyn Read + Send),
        cancel: &CancellationFlag,
    ) -> IngestOutcome {
        let started_at = Utc::now();
        let table = &self.config.table_name;

        let extracted = match run_blocking(|| self.extractor.extract(document, cancel)) {
            Ok(extracted) => extracted,
            Err(cause) => return fatal(IngestStage::Extraction, cause),
        };

        let document_id = DocumentId::from_text(extracted.as_str());
        let chunks = build_chunks(&document_id, &extracted, &self.config.chunking);
        info!(
            document_id = %document_id,
            bytes = extracted.len(),
            chunks = chunks.len(),
            max_chunk_size = self.config.chunking.max_chunk_size,
            "partitioned extracted text"
        );

        if cancel.is_cancelled() {
            return fatal(
                IngestStage::Provisioning,
                IngestError::Cancelled(IngestStage::Provisioning),
            );
        }

        if let Err(cause) = self.provisioner.ensure_table(&self.config.table_spec()).await {
            return fatal(IngestStage::Provisioning, cause);
        }

        let outcomes = self.writer.write_chunks(table, &chunks, cancel).await;
        let written = outcomes.iter().filter(|outcome| outcome.is_written()).count();
        let failures = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                ChunkWriteOutcome::Failed(failure) => Some(failure),
                ChunkWriteOutcome::Written { .. } => None,
            })
            .collect::<Vec<_>>();

        let report = IngestionReport {
            document_id: document_id.to_string(),
            table: table.clone(),
            page_count: extracted.page_count(),
            extracted_bytes: extracted.len(),
            chunk_count: chunks.len(),
            written,
            failures,
            started_at,
            finished_at: Utc::now(),
        };

        if report.failures.is_empty() {
            info!(
                document_id = %report.document_id,
                table = %report.table,
                written = report.written,
                "ingestion succeeded"
            );
            return IngestOutcome::Success(report);
        }

        let failed_keys = report.failed_keys();
        warn!(
            document_id = %report.document_id,
            table = %report.table,
            written = report.written,
            failed = failed_keys.len(),
            "ingestion finished with failed chunks"
        );
        IngestOutcome::PartialFailure {
            report,
            failed_keys,
        }
    }
}

/// `block_in_place` panics outside the multi-threaded runtime, so other flavors run `work` inline.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

fn fatal(stage: IngestStage, cause: IngestError) -> IngestOutcome {
    error!(%stage, error = %cause, "ingestion aborted");
    IngestOutcome::FatalError { stage, cause }
}
