//! HTTP API server: the command surface for the dashboard UI.
//!
//! Keyword and default-message management, reset control, logout and
//! session snapshots (status, QR code as base64 PNG, linked profile).
//! Spawned as a background task in the gateway.

use crate::gateway::Gateway;
use autoreply_channels::generate_qr_image;
use autoreply_core::config::ApiConfig;
use autoreply_core::error::AutoReplyError;
use autoreply_core::rules::{KeywordRule, KeywordRulePatch};
use autoreply_core::session::SessionId;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, patch, post, put},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    gateway: Arc<Gateway>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DefaultMessageRequest {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResetIntervalRequest {
    minutes: u64,
}

/// Constant-time string comparison to prevent timing attacks on API token validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `Err` with the rejection when unauthorized.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Result<(), ApiError> {
    let Some(key) = api_key else {
        return Ok(());
    };

    let value = headers
        .get("authorization")
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing Authorization header"})),
        ))?
        .to_str()
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid Authorization header"})),
            )
        })?;

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

/// Map a command error onto an HTTP status.
fn command_error(e: AutoReplyError) -> ApiError {
    let status = match e {
        AutoReplyError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AutoReplyError::InvalidInterval(_) | AutoReplyError::InvalidMedia(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => {
            error!("API command failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({"error": e.to_string()})))
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("invalid request: {e}")})),
        )
    })
}

/// `GET /api/health`: Health check with uptime and per-session status.
async fn health(headers: HeaderMap, State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;

    let sessions: Vec<Value> = state
        .gateway
        .snapshots()
        .await
        .into_iter()
        .map(|s| json!({"id": s.id, "status": s.status}))
        .collect();

    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": state.gateway.uptime().as_secs(),
        "reset_interval_ms": state.gateway.reset_interval_ms(),
        "sessions": sessions,
    })))
}

/// `GET /api/sessions`: Snapshots of every session.
async fn list_sessions(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    Ok(Json(json!({ "sessions": state.gateway.snapshots().await })))
}

/// `GET /api/sessions/{id}`: Status, QR code and profile of one session.
async fn get_session(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let snapshot = state
        .gateway
        .snapshot(&SessionId::new(id))
        .await
        .map_err(command_error)?;

    let qr_png_base64 = match snapshot.view.qr.as_deref() {
        Some(code) => match generate_qr_image(code) {
            Ok(png) => Some(BASE64.encode(png)),
            Err(e) => {
                warn!("[{}] QR image generation failed: {e}", snapshot.id);
                None
            }
        },
        None => None,
    };

    let mut body = serde_json::to_value(&snapshot).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
    })?;
    body["qr_png_base64"] = json!(qr_png_base64);
    Ok(Json(body))
}

/// `GET /api/sessions/{id}/keywords`
async fn list_keywords(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<KeywordRule>>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let rules = state
        .gateway
        .get_keywords(&SessionId::new(id))
        .await
        .map_err(command_error)?;
    Ok(Json(rules))
}

/// `POST /api/sessions/{id}/keywords`: Append a rule, returns the full list.
async fn add_keyword(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<KeywordRule>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<KeywordRule>>), ApiError> {
    check_auth(&headers, &state.api_key)?;
    let rule = parse_body(body)?;
    let rules = state
        .gateway
        .add_keyword(&SessionId::new(id), rule)
        .await
        .map_err(command_error)?;
    Ok((StatusCode::CREATED, Json(rules)))
}

/// `PATCH /api/sessions/{id}/keywords/{index}`
async fn edit_keyword(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path((id, index)): Path<(String, usize)>,
    body: Result<Json<KeywordRulePatch>, JsonRejection>,
) -> Result<Json<Vec<KeywordRule>>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let patch = parse_body(body)?;
    let rules = state
        .gateway
        .edit_keyword(&SessionId::new(id), index, patch)
        .await
        .map_err(command_error)?;
    Ok(Json(rules))
}

/// `DELETE /api/sessions/{id}/keywords/{index}`
async fn delete_keyword(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<Vec<KeywordRule>>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let rules = state
        .gateway
        .delete_keyword(&SessionId::new(id), index)
        .await
        .map_err(command_error)?;
    Ok(Json(rules))
}

/// `GET /api/sessions/{id}/default-message`
async fn get_default_message(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let message = state
        .gateway
        .get_default_message(&SessionId::new(id))
        .await
        .map_err(command_error)?;
    Ok(Json(json!({ "message": message })))
}

/// `PUT /api/sessions/{id}/default-message`
async fn set_default_message(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<DefaultMessageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let request = parse_body(body)?;
    let message = state
        .gateway
        .set_default_message(&SessionId::new(id), request.message)
        .await
        .map_err(command_error)?;
    Ok(Json(json!({ "message": message })))
}

/// `POST /api/sessions/{id}/default-message/reset`: Greet everyone again.
async fn reset_default_message(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let reset = state
        .gateway
        .reset_default_message(&SessionId::new(id))
        .await
        .map_err(command_error)?;
    Ok(Json(json!({ "reset": reset })))
}

/// `PUT /api/reset-interval`: Change the reset period, in minutes.
async fn set_reset_interval(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<ResetIntervalRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let request = parse_body(body)?;
    let interval_ms = state
        .gateway
        .set_reset_interval(request.minutes)
        .map_err(command_error)?;
    Ok(Json(json!({ "interval_ms": interval_ms })))
}

/// `POST /api/sessions/{id}/logout`: Unlink the account; a fresh QR follows.
async fn logout(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    check_auth(&headers, &state.api_key)?;
    let id = SessionId::new(id);
    state.gateway.logout(&id).await.map_err(command_error)?;
    info!("[{id}] logout requested via API");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"status": "logged_out", "session": id})),
    ))
}

/// Build the axum router with shared state.
fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", get(get_session))
        .route(
            "/api/sessions/{id}/keywords",
            get(list_keywords).post(add_keyword),
        )
        .route(
            "/api/sessions/{id}/keywords/{index}",
            patch(edit_keyword).delete(delete_keyword),
        )
        .route(
            "/api/sessions/{id}/default-message",
            get(get_default_message).put(set_default_message),
        )
        .route(
            "/api/sessions/{id}/default-message/reset",
            post(reset_default_message),
        )
        .route("/api/sessions/{id}/logout", post(logout))
        .route("/api/reset-interval", put(set_reset_interval))
        // Keyword images arrive inline as data URIs.
        .layer(axum::extract::DefaultBodyLimit::max(16 * 1024 * 1024))
        .with_state(state)
}

/// Start the API server. Called from `Gateway::run()`.
pub async fn serve(config: ApiConfig, gateway: Arc<Gateway>) {
    let api_key = if config.api_key.is_empty() {
        None
    } else {
        Some(config.api_key.clone())
    };

    let app = build_router(ApiState { gateway, api_key });
    let addr = format!("{}:{}", config.host, config.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("API server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("API server error: {e}");
    }
}
