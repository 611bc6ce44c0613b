//! `Sahayak` HTTP server.
//!
//! Wires the OTP controllers from `sahayak-core` into a running Axum server.
//! Serves the JSON API at `/v1/*` and the landing, login, OTP entry, and
//! dashboard pages at `/`.

pub mod config;
pub mod error;
pub mod reaper;
pub mod routes;
pub mod session;
pub mod state;
