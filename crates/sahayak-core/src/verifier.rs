//! Code verification seam.
//!
//! [`SimulatedVerifier`] stands in for a remote check: it waits a fixed
//! latency and accepts every code. A real backend implements
//! [`CodeVerifier`] and may return [`VerificationOutcome::Failed`], which
//! sends the entry screen back to input with a message.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::delivery::DeliveryContext;
use crate::otp::OtpCode;

/// Verdict on a submitted code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Succeeded,
    Failed { reason: String },
}

/// Checks a submitted code against whatever issued it.
#[async_trait::async_trait]
pub trait CodeVerifier: Send + Sync {
    async fn verify(&self, code: &OtpCode, delivery: &DeliveryContext) -> VerificationOutcome;
}

/// Accepts every code after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedVerifier {
    latency: Duration,
}

impl SimulatedVerifier {
    /// Delay used when none is configured.
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1500);

    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    #[must_use]
    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Default for SimulatedVerifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LATENCY)
    }
}

#[async_trait::async_trait]
impl CodeVerifier for SimulatedVerifier {
    async fn verify(&self, code: &OtpCode, delivery: &DeliveryContext) -> VerificationOutcome {
        debug!(
            method = %delivery.method(),
            complete = code.is_complete(),
            latency_ms = u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX),
            "simulating code verification"
        );
        tokio::time::sleep(self.latency).await;
        VerificationOutcome::Succeeded
    }
}
