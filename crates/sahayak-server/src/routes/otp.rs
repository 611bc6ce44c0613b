//! OTP session routes: `/v1/otp/sessions/*`
//!
//! The entry page drives its controller entirely through these endpoints and
//! polls `GET /{id}` for the countdown and the redirect.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sahayak_core::delivery::{DeliveryContext, DeliveryMethod};
use sahayak_core::otp::OtpCode;

use crate::error::AppError;
use crate::session::SessionView;
use crate::state::AppState;

/// Build the `/v1/otp/sessions` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(open_session))
        .route("/{id}", get(get_session).delete(leave_session))
        .route("/{id}/slots/{index}", put(set_slot))
        .route("/{id}/slots/{index}/backspace", post(backspace_slot))
        .route("/{id}/resend", post(resend_code))
        .route("/{id}/verify", post(verify_code))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub role: String,
    pub method: String,
    pub contact: String,
}

#[derive(Debug, Deserialize)]
pub struct SetSlotRequest {
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    /// Code to submit instead of the slot contents.
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub redirect: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Open a session for a role after the login screen sent a code.
async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let role = body.role.trim();
    if role.is_empty() {
        return Err(AppError::BadRequest("role must not be empty".to_owned()));
    }
    let contact = body.contact.trim();
    if contact.is_empty() {
        return Err(AppError::BadRequest("contact must not be empty".to_owned()));
    }
    let method: DeliveryMethod = body.method.parse()?;

    let view = state
        .sessions
        .open(role.to_owned(), DeliveryContext::new(method, contact))
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Current state of a session.
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.view(id).await?))
}

/// Write one slot.
async fn set_slot(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(body): Json<SetSlotRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.input(id).await?;
    let snapshot = handle.set_digit(index, &body.value).await?;
    Ok(Json(state.sessions.view_with(id, snapshot).await?))
}

/// Backspace pressed on one slot.
async fn backspace_slot(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.input(id).await?;
    let snapshot = handle.backspace(index).await?;
    Ok(Json(state.sessions.view_with(id, snapshot).await?))
}

/// Request a new code; a no-op while the cool-down runs.
async fn resend_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.input(id).await?;
    let snapshot = handle.resend().await?;
    Ok(Json(state.sessions.view_with(id, snapshot).await?))
}

/// Submit the slot contents, or an explicit code.
async fn verify_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.handle(id).await?;
    let snapshot = match body.code {
        Some(code) => handle.submit_code(OtpCode::new(code)).await?,
        None => handle.submit().await?,
    };
    Ok(Json(state.sessions.view_with(id, snapshot).await?))
}

/// Back navigation: discard the session and return the login path.
async fn leave_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeaveResponse>, AppError> {
    let route = state.sessions.leave(id).await?;
    Ok(Json(LeaveResponse {
        redirect: route.path(),
    }))
}
