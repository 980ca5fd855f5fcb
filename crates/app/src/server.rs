use crate::upload::secure_filename;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pdf_chunk_store_core::{
    ingest_file, is_supported_document, CancellationFlag, IngestError, IngestOutcome,
    IngestStage, IngestionPipeline,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

const UPLOAD_FORM: &str = r#"<!doctype html>
<html>
  <head><title>Upload PDF</title></head>
  <body>
    <h1>Upload a PDF</h1>
    <form method="post" action="/" enctype="multipart/form-data">
      <input type="file" name="file" accept="application/pdf">
      <input type="submit" value="Upload">
    </form>
  </body>
</html>
"#;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub upload_dir: Arc<PathBuf>,
    pub document_timeout: Option<Duration>,
}

impl AppState {
    fn cancellation(&self) -> CancellationFlag {
        self.document_timeout
            .map(CancellationFlag::with_timeout)
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub chunks: usize,
    pub written: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<IngestStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    fn from_outcome(file_name: String, outcome: IngestOutcome) -> (StatusCode, Self) {
        match outcome {
            IngestOutcome::Success(report) => (
                StatusCode::OK,
                Self {
                    file_name,
                    status: "success",
                    document_id: Some(report.document_id),
                    chunks: report.chunk_count,
                    written: report.written,
                    failed_keys: Vec::new(),
                    stage: None,
                    error: None,
                },
            ),
            IngestOutcome::PartialFailure {
                report,
                failed_keys,
            } => (
                StatusCode::BAD_GATEWAY,
                Self {
                    file_name,
                    status: "partial_failure",
                    document_id: Some(report.document_id),
                    chunks: report.chunk_count,
                    written: report.written,
                    failed_keys,
                    stage: None,
                    error: None,
                },
            ),
            IngestOutcome::FatalError { stage, cause } => {
                let (status, label) = match (&cause, stage) {
                    (IngestError::Cancelled(_), _) => (StatusCode::REQUEST_TIMEOUT, "cancelled"),
                    (_, IngestStage::Extraction) => (StatusCode::UNPROCESSABLE_ENTITY, "failed"),
                    (_, IngestStage::Provisioning) => (StatusCode::SERVICE_UNAVAILABLE, "failed"),
                };
                (
                    status,
                    Self {
                        file_name,
                        status: label,
                        document_id: None,
                        chunks: 0,
                        written: 0,
                        failed_keys: Vec::new(),
                        stage: Some(stage),
                        error: Some(cause.to_string()),
                    },
                )
            }
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unsupported(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(upload_form).post(upload_document))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState, max_upload_bytes: usize) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, upload_dir = %state.upload_dir.display(), "upload server listening");

    axum::serve(listener, router(state, max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("upload server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::bad_request(format!("failed to read multipart field: {error}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original = field.file_name().unwrap_or_default().to_string();
        if original.is_empty() {
            return Err(ApiError::bad_request("no selected file"));
        }
        if !is_supported_document(&original) {
            return Err(ApiError::unsupported(format!(
                "unsupported file type: {original}"
            )));
        }
        let file_name = secure_filename(&original)
            .ok_or_else(|| ApiError::bad_request(format!("invalid file name: {original}")))?;

        let data = field
            .bytes()
            .await
            .map_err(|error| ApiError::bad_request(format!("failed to read upload: {error}")))?;

        let stored = state
            .upload_dir
            .join(format!("{}_{}", Uuid::new_v4(), file_name));
        tokio::fs::write(&stored, &data)
            .await
            .map_err(|error| ApiError::internal(format!("failed to store upload: {error}")))?;
        info!(file = %file_name, bytes = data.len(), path = %stored.display(), "upload stored");

        let outcome = ingest_file(&state.pipeline, &stored, &state.cancellation())
            .await
            .map_err(|error| ApiError::internal(error.to_string()))?;

        let (status, body) = UploadResponse::from_outcome(file_name, outcome);
        return Ok((status, Json(body)));
    }

    Err(ApiError::bad_request("no file part"))
}
