//! Succulent HTTP API
//!
//! Each endpoint has a thin axum handler that extracts the request and
//! delegates to an inner function returning `(StatusCode, serde_json::Value)`.
//! The inner functions are testable without axum dispatch.
//!
//! Endpoints:
//! - GET    /                        service descriptor
//! - GET    /health                  liveness
//! - POST   /identify                multipart `image` upload
//! - POST   /chat                    one chat turn
//! - GET    /chat/{id}               conversation for an identification
//! - GET    /history                 paginated identifications
//! - GET    /history/{id}            one identification with its care guide
//! - DELETE /history/{id}            soft delete
//! - GET    /history/{id}/with-chat  identification plus conversation
//! - GET    /uploads/{file}          stored images

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use succulent_core::config::ServerConfig;
use succulent_core::{
    CareCache, CareCatalog, CareGenerator, ChatStore, CompletionBackend, FileIntake,
    IdentificationStore, InferenceBackend, IntakeError, SucculentConfig, UploadMeta,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::subsystems::care::CareResolver;
use crate::subsystems::chat::{ChatOrchestrator, ChatRequest};
use crate::subsystems::history::HistoryPresenter;
use crate::subsystems::identify::Identifier;

pub const SERVICE_NAME: &str = "succulent-identifier-backend";

/// Multipart framing allowance on top of the per-file ceiling.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Capability implementations the handlers run against.
pub struct Backends {
    pub inference: Arc<dyn InferenceBackend>,
    pub completion: Arc<dyn CompletionBackend>,
    pub identifications: Arc<dyn IdentificationStore>,
    pub chats: Arc<dyn ChatStore>,
    pub care_cache: Arc<dyn CareCache>,
    pub catalog: Option<CareCatalog>,
}

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub identifier: Identifier,
    pub chat: ChatOrchestrator,
    pub history: HistoryPresenter,
    pub upload_dir: PathBuf,
    pub body_limit: usize,
    pub cors: bool,
}

impl HttpState {
    pub fn new(config: &SucculentConfig, backends: Backends) -> Result<Self, IntakeError> {
        let intake = FileIntake::from_config(&config.upload)?;
        let upload_dir = intake.upload_dir().to_path_buf();
        let body_limit = usize::try_from(config.upload.max_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(MULTIPART_OVERHEAD_BYTES);

        let care = CareResolver::new(
            backends.care_cache,
            CareGenerator::from_config(backends.completion.clone(), &config.llm),
            backends.catalog,
        );

        Ok(Self {
            identifier: Identifier::new(
                intake,
                backends.inference,
                care,
                backends.identifications.clone(),
                config.identification.species_threshold,
            ),
            chat: ChatOrchestrator::new(
                backends.identifications.clone(),
                backends.chats.clone(),
                backends.completion,
                config.chat.context_window,
                config.llm.chat_max_tokens,
                config.llm.temperature,
            ),
            history: HistoryPresenter::new(backends.identifications, backends.chats),
            upload_dir,
            body_limit,
            cors: config.server.cors,
        })
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let router = Router::new()
        .route("/", get(root_handler).fallback(method_not_allowed_handler))
        .route("/health", get(health_handler).fallback(method_not_allowed_handler))
        .route("/identify", post(identify_handler).fallback(method_not_allowed_handler))
        .route("/chat", post(chat_handler).fallback(method_not_allowed_handler))
        .route(
            "/chat/:identification_id",
            get(chat_history_handler).fallback(method_not_allowed_handler),
        )
        .route("/history", get(history_list_handler).fallback(method_not_allowed_handler))
        .route(
            "/history/:id",
            get(history_detail_handler)
                .delete(history_delete_handler)
                .fallback(method_not_allowed_handler),
        )
        .route(
            "/history/:id/with-chat",
            get(history_with_chat_handler).fallback(method_not_allowed_handler),
        )
        .nest_service("/uploads", ServeDir::new(&state.upload_dir))
        .layer(DefaultBodyLimit::max(state.body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    if state.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    server: &ServerConfig,
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", server.host, server.port);
    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Succulent API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

fn json_parts<T: Serialize>(status: StatusCode, value: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(value) {
        Ok(body) => (status, body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            ApiError::Internal("Failed to encode response".to_string()).into_parts()
        }
    }
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> (StatusCode, serde_json::Value) {
    match result {
        Ok(value) => json_parts(StatusCode::OK, &value),
        Err(e) => e.into_parts(),
    }
}

/// Service descriptor (pure, no IO).
pub fn root_inner() -> serde_json::Value {
    serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /identify",
            "POST /chat",
            "GET /chat/{identification_id}",
            "GET /history",
            "GET /history/{id}",
            "DELETE /history/{id}",
            "GET /history/{id}/with-chat",
            "GET /uploads/{filename}",
            "GET /health",
        ],
    })
}

/// Liveness (pure, no IO).
pub fn health_inner() -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    })
}

pub async fn identify_inner(
    identifier: &Identifier,
    data: &[u8],
    meta: &UploadMeta,
) -> (StatusCode, serde_json::Value) {
    respond(
        identifier
            .identify(data, meta)
            .await
            .map(|outcome| outcome.response),
    )
}

pub async fn chat_inner(
    chat: &ChatOrchestrator,
    request: ChatRequest,
) -> (StatusCode, serde_json::Value) {
    respond(chat.send(request).await)
}

pub async fn chat_history_inner(
    history: &HistoryPresenter,
    identification_id: &str,
) -> (StatusCode, serde_json::Value) {
    respond(history.chat_history(identification_id).await)
}

pub async fn history_list_inner(
    history: &HistoryPresenter,
    params: &HashMap<String, String>,
) -> (StatusCode, serde_json::Value) {
    respond(
        history
            .list(
                params.get("limit").map(String::as_str),
                params.get("offset").map(String::as_str),
            )
            .await,
    )
}

pub async fn history_detail_inner(
    history: &HistoryPresenter,
    id: &str,
) -> (StatusCode, serde_json::Value) {
    respond(history.get(id).await)
}

pub async fn history_with_chat_inner(
    history: &HistoryPresenter,
    id: &str,
) -> (StatusCode, serde_json::Value) {
    respond(history.get_with_chat(id).await)
}

/// Soft delete. `None` body means 204 No Content.
pub async fn history_delete_inner(
    history: &HistoryPresenter,
    id: &str,
) -> (StatusCode, Option<serde_json::Value>) {
    match history.delete(id).await {
        Ok(()) => (StatusCode::NO_CONTENT, None),
        Err(e) => {
            let (status, body) = e.into_parts();
            (status, Some(body))
        }
    }
}

/// Pull the `image` field out of a multipart body.
pub async fn read_image_field(
    mut multipart: Multipart,
    max_bytes: u64,
) -> Result<(Bytes, UploadMeta), ApiError> {
    let form_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::BadRequest(IntakeError::TooLarge { max: max_bytes }.to_string())
        } else {
            tracing::warn!(error = %e, "Failed to parse multipart body");
            ApiError::bad_request("Failed to parse form data")
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(form_error)?;
        let meta = UploadMeta {
            filename,
            size: data.len() as u64,
        };
        return Ok((data, meta));
    }

    Err(ApiError::bad_request("No image file provided"))
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner()))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner()))
}

pub async fn method_not_allowed_handler() -> impl IntoResponse {
    ApiError::MethodNotAllowed("Method not allowed".to_string())
}

pub async fn identify_handler(
    State(state): State<Arc<HttpState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected identify request");
            let (status, body) = ApiError::bad_request("Failed to parse form data").into_parts();
            return (status, Json(body));
        }
    };

    let (status, body) =
        match read_image_field(multipart, state.identifier.max_upload_bytes()).await {
            Ok((data, meta)) => identify_inner(&state.identifier, &data, &meta).await,
            Err(e) => e.into_parts(),
        };
    (status, Json(body))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match request {
        Ok(Json(request)) => chat_inner(&state.chat, request).await,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected chat request");
            ApiError::bad_request("Invalid request body").into_parts()
        }
    };
    (status, Json(body))
}

pub async fn chat_history_handler(
    State(state): State<Arc<HttpState>>,
    Path(identification_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = chat_history_inner(&state.history, &identification_id).await;
    (status, Json(body))
}

pub async fn history_list_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let (status, body) = history_list_inner(&state.history, &params).await;
    (status, Json(body))
}

pub async fn history_detail_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = history_detail_inner(&state.history, &id).await;
    (status, Json(body))
}

pub async fn history_with_chat_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = history_with_chat_inner(&state.history, &id).await;
    (status, Json(body))
}

pub async fn history_delete_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match history_delete_inner(&state.history, &id).await {
        (status, Some(body)) => (status, Json(body)).into_response(),
        (status, None) => status.into_response(),
    }
}

// ============================================================================
// Unit Tests: pure inner functions
// ============================================================================
