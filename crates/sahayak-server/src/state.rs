//! Shared application state for `Sahayak` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use std::sync::Arc;

use sahayak_core::verifier::SimulatedVerifier;

use crate::config::ServerConfig;
use crate::session::{SessionLimits, SessionRegistry};

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Live OTP sessions.
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Build state from configuration, backed by the simulated verifier.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let verifier = Arc::new(SimulatedVerifier::new(config.verification_latency));
        Self {
            sessions: SessionRegistry::new(
                config.timings(),
                verifier,
                SessionLimits {
                    max_sessions: config.max_sessions,
                    ttl: config.session_ttl,
                },
            ),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
