//! HTTP route handlers for `Sahayak`.
//!
//! Routes are organized by surface:
//! - `otp`: OTP session API (open, slot edits, resend, verify, back)
//! - `sys`: Health
//! - `ui`: Landing, login, OTP entry, and dashboard pages

pub mod otp;
pub mod sys;
pub mod ui;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Concurrent in-flight API requests before callers queue.
const API_CONCURRENCY_LIMIT: usize = 256;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .nest("/v1/otp/sessions", otp::router())
        .nest("/v1/sys", sys::router())
        .layer(tower::limit::ConcurrencyLimitLayer::new(API_CONCURRENCY_LIMIT));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .merge(api_routes)
        .merge(ui::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
