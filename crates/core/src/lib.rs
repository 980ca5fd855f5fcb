pub mod cancel;
pub mod chunking;
pub mod config;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod keys;
pub mod models;
pub mod pipeline;
pub mod provision;
pub mod store;
pub mod stores;
pub mod traits;
pub mod writer;

pub use cancel::CancellationFlag;
pub use chunking::{build_chunks, split_payloads, ChunkBoundary, ChunkingConfig, DEFAULT_MAX_CHUNK_SIZE};
pub use config::{IngestConfig, ProvisionOptions, WriteOptions, DEFAULT_TABLE_NAME};
pub use error::{ChunkWriteError, IngestError, IngestStage, StoreError};
pub use extractor::{is_supported_document, PdfTextExtractor, TextExtractor};
pub use ingest::{
    discover_pdf_files, ingest_file, ingest_folder_best_effort, FileOutcome,
    FolderIngestionReport, SkippedPdf,
};
pub use keys::{chunk_key, DocumentId};
pub use models::{Chunk, ChunkWriteOutcome, ExtractedText, IngestOutcome, IngestionReport};
pub use pipeline::IngestionPipeline;
pub use provision::{ProvisionState, TableProvisioner};
pub use store::{ChunkItem, TableSpec, TableStatus, STORE_BATCH_WRITE_LIMIT, STORE_ITEM_LIMIT_BYTES};
pub use stores::{DynamoDbChunkStore, InMemoryChunkStore};
pub use traits::ChunkStore;
pub use writer::BatchWriter;
