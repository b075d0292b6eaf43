//! HTTP dispatch layer
//!
//! Translates requests into broadcaster and stats calls. No state of its own.

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::{header, HeaderMap, HeaderName, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::broadcast::Broadcaster;
use crate::error::Error;
use crate::registry::Identity;
use crate::stats::{StatsCollector, StatsSnapshot};
use crate::transport::{websocket, FrameSink};

use super::error::ApiError;
use super::sessions::SessionSpawner;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Broadcaster,
    pub stats: StatsCollector,
    pub sessions: SessionSpawner,
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/subtitle", post(post_subtitle))
        .route("/connected", post(post_connected))
        .route("/stats", get(get_stats))
        .route("/ws", get(ws_upgrade))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-user-id"),
        ])
}

#[derive(Debug, Default, Deserialize)]
struct AuthQuery {
    auth: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SubtitleRequest {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    subtitle: String,
}

#[derive(Debug, Serialize)]
struct SubtitleResponse {
    subtitle: String,
    connected: usize,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectedRequest {
    #[serde(default)]
    auth: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConnectedResponse {
    connected: usize,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    socketio: StatsSnapshot,
}

/// Request body encodings the producer endpoints understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Ignored,
}

impl BodyKind {
    fn from_headers(headers: &HeaderMap) -> Self {
        let mime = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase());

        match mime.as_deref() {
            Some("application/json") => BodyKind::Json,
            Some("application/x-www-form-urlencoded") => BodyKind::Form,
            _ => BodyKind::Ignored,
        }
    }
}

/// Parse a JSON or form body by content type
///
/// An empty body, or one of any other content type, reads as all defaults.
fn parse_body<T: DeserializeOwned + Default>(headers: &HeaderMap, body: &Bytes) -> Result<T, ApiError> {
    let kind = BodyKind::from_headers(headers);
    if kind == BodyKind::Ignored || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    let parsed = match kind {
        BodyKind::Json => serde_json::from_slice(body).map_err(|e| e.to_string()),
        _ => serde_urlencoded::from_bytes(body).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| Error::invalid_input(format!("Invalid request body: {}", e)).into())
}

/// Pick the identity for a subtitle: a non-empty query value wins
fn resolve_auth(query: Option<String>, body: Option<String>) -> Option<String> {
    query
        .filter(|a| !a.is_empty())
        .or(body)
        .filter(|a| !a.is_empty())
}

async fn health() -> &'static str {
    "Ok."
}

async fn post_subtitle(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubtitleResponse>, ApiError> {
    let request: SubtitleRequest = parse_body(&headers, &body)?;

    let auth = resolve_auth(query.auth, request.auth)
        .ok_or_else(|| ApiError::from(Error::invalid_input("Auth is not provided")))?;

    let connected = state
        .broadcaster
        .send_subtitle(&auth, &request.subtitle)
        .await?;

    Ok(Json(SubtitleResponse {
        subtitle: request.subtitle,
        connected,
    }))
}

async fn post_connected(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ConnectedResponse>, ApiError> {
    let request: ConnectedRequest = parse_body(&headers, &body)?;

    let connected = match request.auth {
        Some(auth) => state.broadcaster.connected_clients(&auth).await,
        None => 0,
    };

    Ok(Json(ConnectedResponse { connected }))
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        socketio: state.stats.snapshot().await,
    })
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let permit = match state.sessions.admit() {
        Ok(permit) => permit,
        Err(e) => return e.into_response(),
    };

    let identity = query.auth.filter(|a| !a.is_empty()).map(Identity::from);
    let sessions = state.sessions;

    ws.on_upgrade(move |socket| async move {
        let (mut sink, source) = websocket::split(socket);
        if sessions.is_shutting_down() {
            sink.close().await;
            return;
        }
        sessions.spawn(sink, source, identity, permit);
    })
}
