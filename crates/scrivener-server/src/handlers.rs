//! HTTP request handlers for the Scrivener service.
//!
//! Implements the streaming pipeline endpoint, job submission and polling,
//! and a health check using axum.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use scrivener_domain::{ChatProvider, JobId, JobRecord, JobStore, ObjectStore};
use scrivener_llm::ModelRegistry;
use scrivener_pipeline::{JobRunner, PipelineError, PipelineRequest, PipelineSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// Buffered NDJSON records per streaming client
const STREAM_BUFFER: usize = 64;

/// Shared application state
pub struct AppState<P, O, J> {
    /// Runs pipelines against the configured collaborators
    pub runner: JobRunner<P, O, J>,
    /// Server-wide pipeline settings
    pub settings: Arc<PipelineSettings>,
    /// Model per pipeline role
    pub models: Arc<ModelRegistry>,
}

impl<P, O, J> Clone for AppState<P, O, J> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            settings: Arc::clone(&self.settings),
            models: Arc::clone(&self.models),
        }
    }
}

impl<P, O, J> AppState<P, O, J>
where
    P: ChatProvider + 'static,
    O: ObjectStore + 'static,
    J: JobStore + 'static,
{
    /// Create state from shared collaborators
    pub fn new(
        provider: Arc<P>,
        objects: Arc<O>,
        jobs: Arc<J>,
        settings: PipelineSettings,
        models: ModelRegistry,
    ) -> Self {
        Self {
            runner: JobRunner::new(provider, objects, jobs),
            settings: Arc::new(settings),
            models: Arc::new(models),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Job submission response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    /// Identifier to poll
    pub job_id: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Longer description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// The request could not be turned into a pipeline configuration
    BadRequest(PipelineError),
    /// No job with the given id
    JobNotFound(String),
    /// Store or runner failure
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.to_string(), Some(e.details())),
            AppError::JobNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Job not found: {}", id), None)
            }
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        let body = Json(ErrorResponse { error, details });
        (status, body).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Config(_) => AppError::BadRequest(e),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

/// POST /pipeline/stream - Run a pipeline and stream NDJSON records
///
/// Progress records are followed by one `result` or `error` record.
async fn stream_pipeline<P, O, J>(
    State(state): State<AppState<P, O, J>>,
    Json(request): Json<PipelineRequest>,
) -> Result<Response, AppError>
where
    P: ChatProvider + 'static,
    O: ObjectStore + 'static,
    J: JobStore + 'static,
{
    let text_key = request.text_key.clone();
    let config = request.into_configuration((*state.settings).clone(), (*state.models).clone())?;
    info!("Streaming {} pipeline for {}", config.pipeline_type, text_key);

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let runner = state.runner.clone();
    tokio::spawn(async move { runner.stream(config, text_key, tx).await });

    let lines = ReceiverStream::new(rx).map(|record| record.to_line());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from_stream(lines))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// POST /jobs - Submit a pipeline job
async fn submit_job<P, O, J>(
    State(state): State<AppState<P, O, J>>,
    Json(request): Json<PipelineRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), AppError>
where
    P: ChatProvider + 'static,
    O: ObjectStore + 'static,
    J: JobStore + 'static,
{
    let text_key = request.text_key.clone();
    let config = request.into_configuration((*state.settings).clone(), (*state.models).clone())?;
    let id = state.runner.spawn(config, text_key)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: id.to_string(),
        }),
    ))
}

/// GET /jobs/{id} - Poll a job
async fn get_job<P, O, J>(
    State(state): State<AppState<P, O, J>>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, AppError>
where
    P: ChatProvider + 'static,
    O: ObjectStore + 'static,
    J: JobStore + 'static,
{
    let job_id = JobId::parse(&id).map_err(|_| AppError::JobNotFound(id.clone()))?;
    match state.runner.status(job_id)? {
        Some(record) => Ok(Json(record)),
        None => {
            warn!("Poll for unknown job {}", id);
            Err(AppError::JobNotFound(id))
        }
    }
}

/// GET /health - Liveness check
async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create the axum router with all routes
pub fn create_router<P, O, J>(state: AppState<P, O, J>) -> AxumRouter
where
    P: ChatProvider + 'static,
    O: ObjectStore + 'static,
    J: JobStore + 'static,
{
    AxumRouter::new()
        .route("/pipeline/stream", post(stream_pipeline::<P, O, J>))
        .route("/jobs", post(submit_job::<P, O, J>))
        .route("/jobs/:id", get(get_job::<P, O, J>))
        .route("/health", get(health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use scrivener_llm::MockProvider;
    use scrivener_store::{MemoryJobStore, MemoryObjectStore};
    use tower::ServiceExt; // for oneshot

    fn create_test_state() -> AppState<MockProvider, MemoryObjectStore, MemoryJobStore> {
        AppState::new(
            Arc::new(MockProvider::new("Standard")),
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryJobStore::new()),
            PipelineSettings::default(),
            ModelRegistry::default(),
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .uri("/jobs/not-a-job-id")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_filter_is_400() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/jobs")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"textKey": "input/a.txt", "pipelineType": "legal", "classFilter": "everything"}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
