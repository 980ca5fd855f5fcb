use crate::cancel::CancellationFlag;
use crate::error::IngestError;
use crate::models::IngestOutcome;
use crate::pipeline::IngestionPipeline;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub async fn ingest_file(
    pipeline: &IngestionPipeline,
    path: &Path,
    cancel: &CancellationFlag,
) -> Result<IngestOutcome, IngestError> {
    if path.file_name().is_none() {
        return Err(IngestError::MissingFileName(path.display().to_string()));
    }

    let mut reader = BufReader::new(File::open(path)?);
    info!(path = %path.display(), "ingesting file");
    Ok(pipeline.ingest(&mut reader, cancel).await)
}

pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: IngestOutcome,
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct FolderIngestionReport {
    pub files: Vec<FileOutcome>,
    pub skipped_files: Vec<SkippedPdf>,
}

impl FolderIngestionReport {
    pub fn all_succeeded(&self) -> bool {
        self.skipped_files.is_empty() && self.files.iter().all(|file| file.outcome.is_success())
    }
}

/// Ingests every PDF under `folder`, continuing past files that fail.
pub async fn ingest_folder_best_effort(
    pipeline: &IngestionPipeline,
    folder: &Path,
    cancel: &CancellationFlag,
) -> Result<FolderIngestionReport, IngestError> {
    let paths = discover_pdf_files(folder);

    if paths.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut files = Vec::new();
    let mut skipped_files = Vec::new();

    for path in paths {
        if cancel.is_cancelled() {
            skipped_files.push(SkippedPdf {
                path,
                reason: "cancelled".to_string(),
            });
            continue;
        }

        match ingest_file(pipeline, &path, cancel).await {
            Ok(outcome) => files.push(FileOutcome { path, outcome }),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable file");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(FolderIngestionReport {
        files,
        skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, ingest_file, ingest_folder_best_effort};
    use crate::cancel::CancellationFlag;
    use crate::config::{IngestConfig, ProvisionOptions};
    use crate::error::IngestStage;
    use crate::extractor::tests::pdf_with_pages;
    use crate::extractor::PdfTextExtractor;
    use crate::models::IngestOutcome;
    use crate::pipeline::IngestionPipeline;
    use crate::stores::InMemoryChunkStore;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn pipeline(store: Arc<InMemoryChunkStore>) -> IngestionPipeline {
        let config = IngestConfig {
            provision: ProvisionOptions {
                timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(1),
            },
            ..IngestConfig::default()
        };
        IngestionPipeline::new(config, Arc::new(PdfTextExtractor), store).expect("valid config")
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"text"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn folder_without_pdfs_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = Arc::new(InMemoryChunkStore::new());
        let result =
            ingest_folder_best_effort(&pipeline(store), dir.path(), &CancellationFlag::new()).await;
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn broken_pdf_does_not_stop_the_folder() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a_broken.pdf"), b"%PDF-1.4\n%broken")?;
        fs::write(
            dir.path().join("b_manual.pdf"),
            pdf_with_pages(&[Some("Maintenance schedule")]),
        )?;

        let store = Arc::new(InMemoryChunkStore::new());
        let report =
            ingest_folder_best_effort(&pipeline(store.clone()), dir.path(), &CancellationFlag::new())
                .await?;

        assert_eq!(report.files.len(), 2);
        assert!(matches!(
            report.files[0].outcome,
            IngestOutcome::FatalError {
                stage: IngestStage::Extraction,
                ..
            }
        ));
        assert!(report.files[1].outcome.is_success());
        assert!(!report.all_succeeded());
        assert_eq!(store.item_count("data"), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_file_is_an_io_error() {
        let store = Arc::new(InMemoryChunkStore::new());
        let dir = tempdir().expect("tempdir");
        let result = ingest_file(
            &pipeline(store),
            &dir.path().join("absent.pdf"),
            &CancellationFlag::new(),
        )
        .await;
        assert!(result.is_err());
    }
}
