//! HTTP routes for the schedules API.
//!
//! - `GET /api/schedules`: the stored map and its version
//! - `POST /api/schedules`: replace the whole map
//! - `GET /api/schedules/subscribe`: WebSocket push of every write
//! - `OPTIONS *`: CORS preflight, empty 200
//! - `GET /health`: liveness
//!
//! Every response carries permissive CORS headers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use timetable_core::api::{
    ErrorResponse, SaveResponse, ScheduleDocument, SchedulesResponse, SCHEDULES_PATH,
    SUBSCRIBE_PATH,
};
use timetable_core::{ScheduleMap, Version};
use tokio::sync::{broadcast, RwLock};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::hub::ScheduleHub;
use super::kv::{KvError, KvNamespace, LAST_UPDATED_KEY, SCHEDULES_KEY};

pub const UNCONFIGURED_MESSAGE: &str =
    "KV store not configured. Set TIMETABLE_KV_DIR or kv_dir in the server config.";
pub const SCHEDULES_REQUIRED_MESSAGE: &str = "Schedules data required";
pub const SAVED_MESSAGE: &str = "Schedules saved successfully";

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    /// `None` when no namespace is configured
    kv: Option<Arc<dyn KvNamespace>>,
    /// Keeps the two keys of one write together
    lock: Arc<RwLock<()>>,
    hub: Arc<ScheduleHub>,
}

/// Build the HTTP API router.
pub fn build_router(kv: Option<Arc<dyn KvNamespace>>, hub: Arc<ScheduleHub>) -> Router {
    let state = AppState {
        kv,
        lock: Arc::new(RwLock::new(())),
        hub,
    };

    Router::new()
        .route("/health", get(health))
        .route(
            SCHEDULES_PATH,
            get(get_schedules)
                .post(post_schedules)
                .fallback(method_not_allowed),
        )
        .route(SUBSCRIBE_PATH, get(subscribe))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(preflight))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
}

/// Answers CORS preflight on any path.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

// ============================================================================
// Responses
// ============================================================================

fn error_response(status: StatusCode, body: ErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

fn unconfigured() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        ErrorResponse::new(UNCONFIGURED_MESSAGE),
    )
}

fn internal_error(error: impl std::fmt::Display + std::fmt::Debug) -> Response {
    tracing::error!("Request failed: {}", error);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::new(error.to_string()).with_details(format!("{:?}", error)),
    )
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response()
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, ErrorResponse::new("Not found"))
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug)]
enum DocumentError {
    Kv(KvError),
    Corrupt(serde_json::Error),
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::Kv(e) => write!(f, "{}", e),
            DocumentError::Corrupt(e) => write!(f, "Stored schedules are corrupt: {}", e),
        }
    }
}

impl From<KvError> for DocumentError {
    fn from(e: KvError) -> Self {
        DocumentError::Kv(e)
    }
}

fn load_document(kv: &dyn KvNamespace) -> Result<ScheduleDocument, DocumentError> {
    let schedules = match kv.get(SCHEDULES_KEY)? {
        Some(raw) => serde_json::from_str(&raw).map_err(DocumentError::Corrupt)?,
        None => ScheduleMap::new(),
    };
    let last_updated = kv
        .get(LAST_UPDATED_KEY)?
        .filter(|stamp| !stamp.is_empty())
        .map(Version::new);

    Ok(ScheduleDocument {
        schedules,
        last_updated,
    })
}

fn store_document(kv: &dyn KvNamespace, document: &ScheduleDocument) -> Result<(), DocumentError> {
    let schedules = serde_json::to_string(&document.schedules).map_err(DocumentError::Corrupt)?;
    kv.put(SCHEDULES_KEY, &schedules)?;
    if let Some(version) = &document.last_updated {
        kv.put(LAST_UPDATED_KEY, version.as_str())?;
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_schedules(State(state): State<AppState>) -> Response {
    let Some(kv) = state.kv.as_deref() else {
        return unconfigured();
    };

    let document = {
        let _read = state.lock.read().await;
        load_document(kv)
    };

    match document {
        Ok(document) => {
            tracing::info!(
                "Retrieved schedules for {} teacher(s), last updated {}",
                document.schedules.len(),
                document
                    .last_updated
                    .as_ref()
                    .map(Version::as_str)
                    .unwrap_or("never")
            );
            Json(SchedulesResponse {
                success: true,
                schedules: document.schedules,
                last_updated: document.last_updated,
            })
            .into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn post_schedules(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(kv) = state.kv.as_deref() else {
        return unconfigured();
    };

    let body: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => return internal_error(e),
    };

    let schedules = match body.get("schedules") {
        None | Some(serde_json::Value::Null) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(SCHEDULES_REQUIRED_MESSAGE),
            );
        }
        Some(value) => value.clone(),
    };

    let schedules: ScheduleMap = match serde_json::from_value(schedules) {
        Ok(schedules) => schedules,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(SCHEDULES_REQUIRED_MESSAGE).with_details(e.to_string()),
            );
        }
    };

    let version = Version::now();
    let document = ScheduleDocument {
        schedules,
        last_updated: Some(version.clone()),
    };

    {
        let _write = state.lock.write().await;
        if let Err(e) = store_document(kv, &document) {
            return internal_error(e);
        }
    }

    tracing::info!(
        "Saved schedules for {} teacher(s) at {}",
        document.schedules.len(),
        version
    );
    let subscribers = state.hub.broadcast(document);
    tracing::debug!("Pushed update to {} subscriber(s)", subscribers);

    Json(SaveResponse {
        success: true,
        last_updated: version,
        message: Some(SAVED_MESSAGE.to_string()),
    })
    .into_response()
}

async fn subscribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.kv.is_none() {
        return unconfigured();
    }
    ws.on_upgrade(move |socket| handle_subscriber(socket, state))
}

async fn send_document(socket: &mut WebSocket, document: &ScheduleDocument) -> bool {
    let text = match serde_json::to_string(document) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to encode schedule document: {}", e);
            return false;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn current_document(state: &AppState) -> Option<ScheduleDocument> {
    let kv = state.kv.as_deref()?;
    let _read = state.lock.read().await;
    match load_document(kv) {
        Ok(document) => Some(document),
        Err(e) => {
            tracing::warn!("Failed to load schedules for subscriber: {}", e);
            None
        }
    }
}

/// Sends the current document, then every write until the client leaves.
async fn handle_subscriber(mut socket: WebSocket, state: AppState) {
    // Subscribe before reading so no write falls in between
    let mut updates = state.hub.subscribe();
    tracing::info!(
        "Subscriber connected ({} total)",
        state.hub.subscriber_count()
    );

    let Some(current) = current_document(&state).await else {
        return;
    };
    if !send_document(&mut socket, &current).await {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => {
                let document = match update {
                    Ok(document) => document,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Subscriber lagged by {} update(s)", skipped);
                        match current_document(&state).await {
                            Some(document) => document,
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !send_document(&mut socket, &document).await {
                    break;
                }
            }
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Client frames carry nothing we act on
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("Subscriber disconnected");
}
