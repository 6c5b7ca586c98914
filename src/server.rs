//! HTTP server exposing the question answering endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question with citations and contexts |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and a message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::AnswerPayload;
use crate::service::QaService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<QaService>,
    default_k: i64,
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and serves requests
/// until the process is terminated. The service instance is constructed by
/// the caller and shared across requests; its lifecycle belongs to the
/// hosting process.
pub async fn run_server(config: &Config, service: Arc<QaService>) -> anyhow::Result<()> {
    let state = AppState {
        service,
        default_k: config.retrieval.answer_top_k,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("QA server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
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

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Maps `ask` failures to HTTP status codes. Validation errors (a bad
/// `mode` value) become 400; collaborator failures become 500.
fn classify_ask_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("mode must be") || msg.contains("must not be empty") {
        bad_request(msg)
    } else {
        internal_error(msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

/// JSON request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    /// Natural language question.
    q: String,
    /// Number of contexts to return, clamped to [1, 20].
    #[serde(default)]
    k: Option<i64>,
    /// Search mode: `baseline` (raw vector) or `hybrid` (fused).
    #[serde(default)]
    mode: Option<String>,
}

/// Handler for `POST /ask`.
///
/// Rejects an empty (after trimming) question before it reaches the core.
/// `k` defaults to the configured `answer_top_k`; `mode` defaults to
/// `hybrid`.
async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AnswerPayload>, AppError> {
    let question = request.q.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let k = request.k.unwrap_or(state.default_k);
    let mode = request.mode.unwrap_or_default();

    let payload = state
        .service
        .ask(question, k, &mode)
        .await
        .map_err(classify_ask_error)?;

    Ok(Json(payload))
}
