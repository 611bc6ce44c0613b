//! Server configuration for `Sahayak`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `SAHAYAK_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use sahayak_core::controller::OtpTimings;
use sahayak_core::otp::RESEND_COOLDOWN_SECS;
use sahayak_core::verifier::SimulatedVerifier;

/// Default listener address.
const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Simulated verification latency.
    pub verification_latency: Duration,
    /// Pause between a successful verification and the dashboard redirect.
    pub redirect_delay: Duration,
    /// Resend cool-down in seconds.
    pub resend_cooldown_secs: u32,
    /// Sessions older than this are shut down by the reaper.
    pub session_ttl: Duration,
    /// Seconds between reaper passes.
    pub reap_interval_secs: u64,
    /// Maximum number of live OTP sessions.
    pub max_sessions: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on, binds to `0.0.0.0`
    /// - `SAHAYAK_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:8080`)
    /// - `SAHAYAK_LOG_LEVEL`: log filter (default: `info`)
    /// - `SAHAYAK_VERIFY_LATENCY_MS`: simulated verification latency (default: `1500`)
    /// - `SAHAYAK_REDIRECT_DELAY_MS`: success-to-redirect delay (default: `2000`)
    /// - `SAHAYAK_RESEND_COOLDOWN_SECS`: resend cool-down (default: `30`)
    /// - `SAHAYAK_SESSION_TTL_SECS`: maximum session age (default: `900`)
    /// - `SAHAYAK_REAP_INTERVAL_SECS`: seconds between reaper passes (default: `60`)
    /// - `SAHAYAK_MAX_SESSIONS`: live session cap (default: `10000`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        // Priority: SAHAYAK_BIND_ADDR > PORT > default 127.0.0.1:8080
        let bind_addr = if let Some(addr) = lookup("SAHAYAK_BIND_ADDR") {
            addr.parse().unwrap_or_else(|_| SocketAddr::from(DEFAULT_BIND))
        } else if let Some(port_str) = lookup("PORT") {
            let port: u16 = port_str.parse().unwrap_or(DEFAULT_BIND.1);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(DEFAULT_BIND)
        };

        let log_level = lookup("SAHAYAK_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let default_latency_ms =
            u64::try_from(SimulatedVerifier::DEFAULT_LATENCY.as_millis()).unwrap_or(1500);
        let verification_latency = Duration::from_millis(
            parsed("SAHAYAK_VERIFY_LATENCY_MS").unwrap_or(default_latency_ms),
        );

        let redirect_delay =
            Duration::from_millis(parsed("SAHAYAK_REDIRECT_DELAY_MS").unwrap_or(2000));

        let resend_cooldown_secs = lookup("SAHAYAK_RESEND_COOLDOWN_SECS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(RESEND_COOLDOWN_SECS);

        let session_ttl = Duration::from_secs(parsed("SAHAYAK_SESSION_TTL_SECS").unwrap_or(900));

        let reap_interval_secs = parsed("SAHAYAK_REAP_INTERVAL_SECS")
            .filter(|secs| *secs > 0)
            .unwrap_or(60);

        let max_sessions = lookup("SAHAYAK_MAX_SESSIONS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(10_000);

        Self {
            bind_addr,
            log_level,
            verification_latency,
            redirect_delay,
            resend_cooldown_secs,
            session_ttl,
            reap_interval_secs,
            max_sessions,
        }
    }

    /// Controller timer settings derived from this configuration.
    #[must_use]
    pub fn timings(&self) -> OtpTimings {
        OtpTimings {
            redirect_delay: self.redirect_delay,
            resend_cooldown_secs: self.resend_cooldown_secs,
            ..OtpTimings::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
