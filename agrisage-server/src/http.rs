//! Agrisage HTTP REST API
//!
//! Axum-based HTTP server exposing the advisory/diagnosis record pipeline.
//! The surrounding application (pages, auth screens) talks to the record
//! store exclusively through these endpoints; the caller supplies the owner
//! id explicitly on every request.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! Endpoints:
//! - GET    /health                 — health check with DB status
//! - GET    /version                — server version info
//! - POST   /advisory               — generate and store an advisory
//! - POST   /diagnosis              — diagnose an uploaded crop image
//! - GET    /advisories/{user_id}   — list advisories (with display trees)
//! - GET    /diagnostics/{user_id}  — list diagnostics
//! - DELETE /advisory/{id}          — delete one advisory
//! - DELETE /advisories/{user_id}   — delete all advisories for an owner
//! - DELETE /diagnostic/{id}        — delete one diagnostic (+ its blob)
//! - DELETE /diagnostics/{user_id}  — delete all diagnostics (+ blobs)

use std::sync::Arc;

use agrisage_core::deletion::{DeletionCoordinator, DeletionReport};
use agrisage_core::generation::{GeminiClient, GenerationConfig, GenerationError};
use agrisage_core::pipeline::{AdvisoryInput, DiagnosisInput, Pipeline, PipelineError};
use agrisage_core::prompt::OutputLanguage;
use agrisage_core::render::advice_view;
use agrisage_core::storage::{BlobError, BlobStore, BucketClient, BucketConfig};
use agrisage_core::store::{PgRecordStore, RecordStore, StoreError};
use agrisage_core::AgrisageConfig;
use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shared state for all HTTP handlers
pub struct AppState {
    pub pool: PgPool,
    pub pipeline: Pipeline,
    pub store: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Wire the production pipeline. Credential problems surface here,
    /// before the server accepts any request.
    pub fn from_config(config: &AgrisageConfig, pool: PgPool) -> Result<Self> {
        let generator = Arc::new(GeminiClient::new(GenerationConfig::new(
            Some(config.generation.resolved_api_key()),
            config.generation.model.clone(),
        ))?);
        let blobs: Arc<dyn BlobStore> = Arc::new(BucketClient::new(BucketConfig {
            base_url: config.storage.base_url.clone(),
            bucket: config.storage.bucket.clone(),
            service_key: config.storage.resolved_service_key(),
        })?);
        let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool.clone()));

        Ok(Self {
            pool,
            pipeline: Pipeline::new(generator, store.clone(), blobs.clone()),
            store,
            blobs,
        })
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/advisory", post(advisory_handler))
        .route("/diagnosis", post(diagnosis_handler))
        .route(
            "/advisories/:user_id",
            get(list_advisories_handler).delete(delete_all_advisories_handler),
        )
        .route("/advisory/:id", delete(delete_advisory_handler))
        .route(
            "/diagnostics/:user_id",
            get(list_diagnostics_handler).delete(delete_all_diagnostics_handler),
        )
        .route("/diagnostic/:id", delete(delete_diagnostic_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", host, port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Agrisage HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AdvisoryRequest {
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub crop: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub season: String,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiagnosisRequest {
    pub user_id: Option<Uuid>,
    pub image_base64: String,
    pub content_type: String,
    pub file_ext: Option<String>,
    pub language: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    match agrisage_core::db::health_check(pool).await {
        Ok(v) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "postgresql": v,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "agrisage/1",
    })
}

/// A missing owner id means operations are unavailable, not an error state
/// to render: the client redirects to sign-in on 400.
pub fn require_user(user_id: Option<Uuid>) -> Result<Uuid, (StatusCode, serde_json::Value)> {
    user_id.ok_or((
        StatusCode::BAD_REQUEST,
        serde_json::json!({
            "error": "no signed-in user; operations unavailable",
            "status": "error",
        }),
    ))
}

/// Map a pipeline failure to a status + a single user-visible message.
pub fn pipeline_error_response(e: &PipelineError) -> (StatusCode, serde_json::Value) {
    let status = match e {
        PipelineError::Generation(GenerationError::MissingApiKey)
        | PipelineError::BlobWrite(BlobError::MissingCredential) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        PipelineError::Generation(_) | PipelineError::Malformed(_) => StatusCode::BAD_GATEWAY,
        PipelineError::BlobWrite(_) | PipelineError::StoreWrite(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        serde_json::json!({
            "error": e.user_message(),
            "status": "error",
        }),
    )
}

fn store_error_response(e: &StoreError) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({
            "error": e.to_string(),
            "status": "error",
        }),
    )
}

fn report_body(report: &DeletionReport) -> serde_json::Value {
    let mut body = serde_json::json!({
        "status": "ok",
        "rows_deleted": report.rows_deleted,
        "failed_blob_keys": report.failed_blob_keys,
    });
    if !report.failed_blob_keys.is_empty() {
        // non-fatal: rows are gone, some images were left behind
        body["warning"] = serde_json::json!("some stored images could not be removed");
    }
    body
}

/// File extension for the blob key when the caller did not supply one.
pub fn ext_for_content_type(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Inner advisory generation — runs the pipeline for a signed-in owner.
pub async fn advisory_inner(
    pipeline: &Pipeline,
    req: AdvisoryRequest,
) -> (StatusCode, serde_json::Value) {
    let user_id = match require_user(req.user_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let language = OutputLanguage::from_code(req.language.as_deref().unwrap_or("en"));

    let run = pipeline
        .run_advisory(AdvisoryInput {
            owner: user_id,
            crop: req.crop,
            location: req.location,
            season: req.season,
            language,
        })
        .await;

    match run.outcome {
        Ok(record) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "ok",
                "record": record,
                "states": run.states,
            }),
        ),
        Err(e) => pipeline_error_response(&e),
    }
}

/// Inner diagnosis — decodes the inline image and runs the pipeline.
pub async fn diagnosis_inner(
    pipeline: &Pipeline,
    req: DiagnosisRequest,
) -> (StatusCode, serde_json::Value) {
    let user_id = match require_user(req.user_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let image = match general_purpose::STANDARD.decode(&req.image_base64) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                serde_json::json!({
                    "error": "image_base64 must be a non-empty base64 payload",
                    "status": "error",
                }),
            );
        }
    };

    let file_ext = req
        .file_ext
        .unwrap_or_else(|| ext_for_content_type(&req.content_type).to_string());
    let language = OutputLanguage::from_code(req.language.as_deref().unwrap_or("en"));

    let run = pipeline
        .run_diagnosis(DiagnosisInput {
            owner: user_id,
            image,
            content_type: req.content_type,
            file_ext,
            language,
        })
        .await;

    match run.outcome {
        Ok(record) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "ok",
                "record": record,
                "states": run.states,
            }),
        ),
        Err(e) => pipeline_error_response(&e),
    }
}

/// Inner advisory listing — attaches a display tree per record so the
/// presentation layer never decodes the stored advice itself.
pub async fn list_advisories_inner(
    store: &dyn RecordStore,
    user_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    match store.list_advisories(user_id).await {
        Ok(records) => {
            let items: Vec<serde_json::Value> = records
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "user_id": r.user_id,
                        "diagnosis": r.diagnosis,
                        "advice": r.advice,
                        "advice_view": advice_view(&r.advice),
                        "created_at": r.created_at,
                    })
                })
                .collect();
            (
                StatusCode::OK,
                serde_json::json!({ "status": "ok", "records": items }),
            )
        }
        Err(e) => store_error_response(&e),
    }
}

pub async fn list_diagnostics_inner(
    store: &dyn RecordStore,
    user_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    match store.list_diagnostics(user_id).await {
        Ok(records) => (
            StatusCode::OK,
            serde_json::json!({ "status": "ok", "records": records }),
        ),
        Err(e) => store_error_response(&e),
    }
}

pub async fn delete_advisory_inner(
    store: &dyn RecordStore,
    blobs: &dyn BlobStore,
    id: Uuid,
) -> (StatusCode, serde_json::Value) {
    let coordinator = DeletionCoordinator::new(store, blobs);
    match coordinator.delete_advisory(id).await {
        Ok(report) => (StatusCode::OK, report_body(&report)),
        Err(e) => store_error_response(&e),
    }
}

pub async fn delete_all_advisories_inner(
    store: &dyn RecordStore,
    blobs: &dyn BlobStore,
    user_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    let coordinator = DeletionCoordinator::new(store, blobs);
    match coordinator.delete_all_advisories(user_id).await {
        Ok(report) => (StatusCode::OK, report_body(&report)),
        Err(e) => store_error_response(&e),
    }
}

pub async fn delete_diagnostic_inner(
    store: &dyn RecordStore,
    blobs: &dyn BlobStore,
    id: Uuid,
) -> (StatusCode, serde_json::Value) {
    let coordinator = DeletionCoordinator::new(store, blobs);
    match coordinator.delete_diagnostic(id).await {
        Ok(report) => (StatusCode::OK, report_body(&report)),
        Err(e) => store_error_response(&e),
    }
}

pub async fn delete_all_diagnostics_inner(
    store: &dyn RecordStore,
    blobs: &dyn BlobStore,
    user_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    let coordinator = DeletionCoordinator::new(store, blobs);
    match coordinator.delete_all_diagnostics(user_id).await {
        Ok(report) => (StatusCode::OK, report_body(&report)),
        Err(e) => store_error_response(&e),
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn advisory_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdvisoryRequest>,
) -> impl IntoResponse {
    let (status, body) = advisory_inner(&state.pipeline, req).await;
    (status, Json(body))
}

pub async fn diagnosis_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DiagnosisRequest>,
) -> impl IntoResponse {
    let (status, body) = diagnosis_inner(&state.pipeline, req).await;
    (status, Json(body))
}

pub async fn list_advisories_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = list_advisories_inner(state.store.as_ref(), user_id).await;
    (status, Json(body))
}

pub async fn list_diagnostics_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = list_diagnostics_inner(state.store.as_ref(), user_id).await;
    (status, Json(body))
}

pub async fn delete_advisory_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = delete_advisory_inner(state.store.as_ref(), state.blobs.as_ref(), id).await;
    (status, Json(body))
}

pub async fn delete_all_advisories_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) =
        delete_all_advisories_inner(state.store.as_ref(), state.blobs.as_ref(), user_id).await;
    (status, Json(body))
}

pub async fn delete_diagnostic_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) =
        delete_diagnostic_inner(state.store.as_ref(), state.blobs.as_ref(), id).await;
    (status, Json(body))
}

pub async fn delete_all_diagnostics_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) =
        delete_all_diagnostics_inner(state.store.as_ref(), state.blobs.as_ref(), user_id).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — pure inner functions, no DB or network required
// ============================================================================
