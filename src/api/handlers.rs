//! REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use super::types::{ErrorResponse, FlashRequest, FlashResponse, SessionResponse};
use crate::middleware::SessionManager;
use crate::session::{Flash, Session, FLASH_KEY};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info(State(state): State<AppState>) -> Json<Value> {
    let config = state.manager.config();
    Json(serde_json::json!({
        "name": "shard-session",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "cookie_name": config.cookie_name(),
        "lifetime_secs": config.lifetime_secs(),
    }))
}

/// Show the caller's session.
pub async fn get_session(session: Session) -> Json<SessionResponse> {
    Json(SessionResponse::from_session(&session))
}

/// Store a JSON value under `key`.
pub async fn put_value(
    session: Session,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<SessionResponse>, ApiError> {
    if key == FLASH_KEY {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::reserved_key(&key)),
        ));
    }

    session.insert(key, value).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal_error(e.to_string())),
        )
    })?;

    Ok(Json(SessionResponse::from_session(&session)))
}

/// Remove the value under `key`.
pub async fn delete_value(session: Session, Path(key): Path<String>) -> StatusCode {
    match session.remove(&key) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// Move the session to a fresh identifier.
pub async fn regenerate_session(session: Session) -> Json<SessionResponse> {
    session.regenerate();
    Json(SessionResponse::from_session(&session))
}

/// End the session.
pub async fn destroy_session(session: Session) -> StatusCode {
    session.destroy();
    StatusCode::NO_CONTENT
}

/// Queue a flash message for a later request.
pub async fn push_flash(
    flash: Flash,
    Json(req): Json<FlashRequest>,
) -> Result<StatusCode, ApiError> {
    if req.kind.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("flash kind cannot be empty")),
        ));
    }

    flash.set(req.kind, req.message);
    Ok(StatusCode::CREATED)
}

/// Read and consume the flash messages of `kind`.
pub async fn take_flash(flash: Flash, Path(kind): Path<String>) -> Json<FlashResponse> {
    let messages = flash.take(&kind);
    Json(FlashResponse { kind, messages })
}
