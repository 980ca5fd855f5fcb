mod server;
mod upload;

use aws_sdk_dynamodb::config::Region;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_chunk_store_core::{
    ingest_file, ingest_folder_best_effort, CancellationFlag, ChunkBoundary, ChunkStore,
    ChunkingConfig, DynamoDbChunkStore, InMemoryChunkStore, IngestConfig, IngestOutcome,
    IngestionPipeline, PdfTextExtractor, ProvisionOptions, WriteOptions, DEFAULT_MAX_CHUNK_SIZE,
    DEFAULT_TABLE_NAME, STORE_BATCH_WRITE_LIMIT,
};
use server::AppState;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chunk-store", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Destination table name
    #[arg(long, env = "CHUNK_STORE_TABLE", default_value = DEFAULT_TABLE_NAME)]
    table: String,

    /// Backing store for chunks
    #[arg(long, value_enum, default_value_t = StoreBackend::Dynamodb)]
    store: StoreBackend,

    /// AWS region of the DynamoDB table
    #[arg(long, env = "AWS_REGION", default_value = "ap-southeast-2")]
    region: String,

    /// Override the DynamoDB endpoint, e.g. a local emulator
    #[arg(long, env = "DYNAMODB_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Largest chunk payload in bytes
    #[arg(long, env = "CHUNK_STORE_MAX_CHUNK_SIZE", default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: usize,

    /// Where chunks may be cut
    #[arg(long, value_enum, default_value_t = BoundaryArg::Byte)]
    chunk_boundary: BoundaryArg,

    /// Read capacity units used when creating the table
    #[arg(long, default_value = "5")]
    read_capacity: i64,

    /// Write capacity units used when creating the table
    #[arg(long, default_value = "5")]
    write_capacity: i64,

    /// Items per batch write request
    #[arg(long, default_value_t = STORE_BATCH_WRITE_LIMIT)]
    batch_size: usize,

    /// Attempts per item before it is reported as failed
    #[arg(long, default_value = "3")]
    max_attempts: u32,

    /// Batch requests in flight at once
    #[arg(long, default_value = "4")]
    max_in_flight: usize,

    /// Seconds to wait for a new table to become active
    #[arg(long, default_value = "300")]
    provision_timeout_secs: u64,

    /// Abort a single document's ingestion after this many seconds
    #[arg(long, env = "CHUNK_STORE_DOCUMENT_TIMEOUT_SECS")]
    document_timeout_secs: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF file, or every PDF under a folder.
    Ingest {
        /// PDF file or folder that contains PDFs recursively.
        #[arg(long)]
        path: PathBuf,
    },
    /// Serve an upload form that ingests each submitted PDF.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
        /// Directory uploaded files are saved to.
        #[arg(long, default_value = "uploads")]
        upload_dir: PathBuf,
        /// Largest accepted upload in bytes.
        #[arg(long, default_value = "104857600")]
        max_upload_bytes: usize,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreBackend {
    Dynamodb,
    Memory,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BoundaryArg {
    Byte,
    Char,
}

impl From<BoundaryArg> for ChunkBoundary {
    fn from(value: BoundaryArg) -> Self {
        match value {
            BoundaryArg::Byte => ChunkBoundary::Byte,
            BoundaryArg::Char => ChunkBoundary::CharBoundary,
        }
    }
}

impl Cli {
    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            table_name: self.table.clone(),
            read_capacity: self.read_capacity,
            write_capacity: self.write_capacity,
            chunking: ChunkingConfig {
                max_chunk_size: self.max_chunk_size,
                boundary: self.chunk_boundary.into(),
            },
            write: WriteOptions {
                batch_size: self.batch_size,
                max_attempts: self.max_attempts,
                max_in_flight: self.max_in_flight,
                ..WriteOptions::default()
            },
            provision: ProvisionOptions {
                timeout: Duration::from_secs(self.provision_timeout_secs),
                ..ProvisionOptions::default()
            },
        }
    }

    fn document_timeout(&self) -> Option<Duration> {
        self.document_timeout_secs.map(Duration::from_secs)
    }

    async fn build_store(&self) -> Arc<dyn ChunkStore> {
        match self.store {
            StoreBackend::Memory => Arc::new(InMemoryChunkStore::new()),
            StoreBackend::Dynamodb => {
                let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(Region::new(self.region.clone()));
                if let Some(endpoint) = &self.endpoint_url {
                    loader = loader.endpoint_url(endpoint);
                }
                let sdk_config = loader.load().await;
                Arc::new(DynamoDbChunkStore::new(aws_sdk_dynamodb::Client::new(
                    &sdk_config,
                )))
            }
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    let cli = Cli::parse();

    init_logging(cli.log_json);
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        table = %cli.table,
        "pdf-chunk-store boot"
    );

    let store = cli.build_store().await;
    let pipeline = IngestionPipeline::new(cli.ingest_config(), Arc::new(PdfTextExtractor), store)?;

    match &cli.command {
        Command::Ingest { path } => run_ingest(&pipeline, path, cli.document_timeout()).await,
        Command::Serve {
            bind,
            upload_dir,
            max_upload_bytes,
        } => {
            tokio::fs::create_dir_all(upload_dir).await?;
            let state = AppState {
                pipeline: Arc::new(pipeline),
                upload_dir: Arc::new(upload_dir.clone()),
                document_timeout: cli.document_timeout(),
            };
            server::serve(*bind, state, *max_upload_bytes).await
        }
    }
}

async fn run_ingest(
    pipeline: &IngestionPipeline,
    path: &Path,
    document_timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let cancel = document_timeout
        .map(CancellationFlag::with_timeout)
        .unwrap_or_default();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after in-flight requests");
            on_interrupt.cancel();
        }
    });

    if path.is_dir() {
        let report = ingest_folder_best_effort(pipeline, path, &cancel).await?;

        for skipped in &report.skipped_files {
            warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
        }
        for file in &report.files {
            print_outcome(&file.path, &file.outcome);
        }

        if !report.all_succeeded() {
            anyhow::bail!(
                "{} of {} file(s) did not ingest cleanly",
                report.files.iter().filter(|file| !file.outcome.is_success()).count()
                    + report.skipped_files.len(),
                report.files.len() + report.skipped_files.len()
            );
        }
        return Ok(());
    }

    let outcome = ingest_file(pipeline, path, &cancel).await?;
    print_outcome(path, &outcome);
    outcome.into_result()?;
    Ok(())
}

fn print_outcome(path: &Path, outcome: &IngestOutcome) {
    match outcome {
        IngestOutcome::Success(report) => println!(
            "{}: {} chunk(s) written to {} document_id={} at {}",
            path.display(),
            report.written,
            report.table,
            report.document_id,
            report.finished_at.to_rfc3339()
        ),
        IngestOutcome::PartialFailure {
            report,
            failed_keys,
        } => {
            println!(
                "{}: {} of {} chunk(s) written to {}, {} failed",
                path.display(),
                report.written,
                report.chunk_count,
                report.table,
                failed_keys.len()
            );
            for failure in &report.failures {
                println!("  failed {} ({})", failure.chunk_key, failure.reason);
            }
        }
        IngestOutcome::FatalError { stage, cause } => {
            println!("{}: failed during {stage}: {cause}", path.display());
        }
    }
}
