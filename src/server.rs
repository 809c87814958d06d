//! HTTP API for snapshot generation.
//!
//! Exposes the coordinator to browser extensions and other HTTP clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/analyze` | Generate a snapshot for one document |
//!
//! `POST /api/analyze` accepts
//! `{ "doc_id": "...", "since_hours": 24, "force_refresh": false }`
//! (only `doc_id` is required) and returns the snapshot as JSON. Partial
//! data failures are part of a successful response; see
//! `data_completeness.errors`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "doc_id must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so extension pages can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::coordinator::Coordinator;
use crate::models::CoordinationSnapshot;

/// Build the router. Exposed separately from [`run_server`] for tests.
pub fn router(coordinator: Arc<Coordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/analyze", post(handle_analyze))
        .layer(cors)
        .with_state(coordinator)
}

/// Bind to `bind` and serve until the process is terminated.
pub async fn run_server(bind: &str, coordinator: Arc<Coordinator>) -> anyhow::Result<()> {
    let app = router(coordinator);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind, "server listening");
    println!("Docs coordinator API listening on http://{}", bind);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/analyze ============

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    doc_id: String,
    #[serde(default)]
    since_hours: Option<u32>,
    #[serde(default)]
    force_refresh: bool,
}

/// The pipeline blocks on HTTP, so it runs on the blocking pool.
///
/// Malformed bodies are reported as `bad_request` like any other input error.
async fn handle_analyze(
    State(coordinator): State<Arc<Coordinator>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<CoordinationSnapshot>, AppError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let doc_id = req.doc_id.trim().to_string();
    if doc_id.is_empty() {
        return Err(bad_request("doc_id must not be empty"));
    }

    info!(
        doc_id = %doc_id,
        since_hours = ?req.since_hours,
        force_refresh = req.force_refresh,
        "analyze request"
    );

    let snapshot = tokio::task::spawn_blocking(move || {
        coordinator.generate_snapshot(&doc_id, req.since_hours, req.force_refresh)
    })
    .await
    .map_err(|e| {
        error!("analysis worker failed: {}", e);
        internal(format!("analysis failed: {}", e))
    })?;

    Ok(Json(snapshot))
}
