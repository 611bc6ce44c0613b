//! OTP session registry.
//!
//! Each session pairs one [`OtpController`] with the bookkeeping the HTTP
//! layer needs: the role and delivery details it was opened with, creation
//! time, and the redirect its controller asked for. The controller's
//! navigator writes the redirect into a `watch` slot that the state route
//! reads, since the browser learns about navigation by polling.
//!
//! Sessions live only in memory. A periodic [`SessionRegistry::reap`] pass
//! drops finished sessions and shuts down ones that outlived the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use sahayak_core::controller::{OtpController, OtpHandle, OtpTimings};
use sahayak_core::delivery::{DeliveryContext, DeliveryMethod};
use sahayak_core::error::OtpError;
use sahayak_core::navigation::{Navigator, Route};
use sahayak_core::otp::{OtpSnapshot, Phase};
use sahayak_core::verifier::CodeVerifier;

/// Errors from session lookups and input gating.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No live session has this ID.
    #[error("otp session not found: {id}")]
    NotFound { id: Uuid },

    /// The live-session cap has been reached.
    #[error("too many active otp sessions (limit {limit})")]
    AtCapacity { limit: usize },

    /// Input is disabled in the session's current phase.
    #[error("otp input is disabled while {phase}")]
    InputDisabled { phase: &'static str },

    /// The session's controller rejected the operation.
    #[error(transparent)]
    Otp(#[from] OtpError),
}

/// Navigator that records the requested route for the polling page.
#[derive(Debug)]
pub struct SessionNavigator {
    target: watch::Sender<Option<Route>>,
}

impl Navigator for SessionNavigator {
    fn navigate(&self, route: Route) {
        self.target.send_replace(Some(route));
    }
}

/// One OTP entry attempt.
pub struct OtpSession {
    role: String,
    delivery: DeliveryContext,
    created_at: DateTime<Utc>,
    started: Instant,
    handle: OtpHandle,
    redirect: watch::Receiver<Option<Route>>,
    /// Set by the first reaper pass that finds the controller closed.
    closed_seen: bool,
}

impl OtpSession {
    fn view(&self, id: Uuid) -> SessionView {
        SessionView {
            id,
            role: self.role.clone(),
            method: self.delivery.method(),
            contact: self.delivery.contact().to_owned(),
            prompt: self.delivery.prompt(),
            created_at: self.created_at.to_rfc3339(),
            state: self.handle.snapshot(),
            redirect: self.redirect.borrow().as_ref().map(Route::path),
            closed: self.handle.is_closed(),
        }
    }
}

impl std::fmt::Debug for OtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpSession")
            .field("role", &self.role)
            .field("method", &self.delivery.method())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a session returned by every API call.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub role: String,
    pub method: DeliveryMethod,
    pub contact: String,
    pub prompt: String,
    pub created_at: String,
    pub state: OtpSnapshot,
    /// Path the page should load next, once the controller has navigated.
    pub redirect: Option<String>,
    pub closed: bool,
}

/// Limits applied to the registry.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub ttl: Duration,
}

/// Result of one reaper pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Sessions removed because their controller had finished.
    pub finished: usize,
    /// Sessions shut down for exceeding the TTL.
    pub expired: usize,
}

/// All live OTP sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, OtpSession>>,
    timings: OtpTimings,
    verifier: Arc<dyn CodeVerifier>,
    limits: SessionLimits,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(timings: OtpTimings, verifier: Arc<dyn CodeVerifier>, limits: SessionLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timings,
            verifier,
            limits,
        }
    }

    /// Open a new entry attempt and start its controller.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AtCapacity`] when the live-session cap is reached.
    pub async fn open(
        &self,
        role: String,
        delivery: DeliveryContext,
    ) -> Result<SessionView, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.limits.max_sessions {
            warn!(limit = self.limits.max_sessions, "otp session cap reached");
            return Err(SessionError::AtCapacity {
                limit: self.limits.max_sessions,
            });
        }

        let id = Uuid::new_v4();
        let (target, redirect) = watch::channel(None);
        let navigator = Arc::new(SessionNavigator { target });

        let handle = {
            let span = info_span!("otp_session", session_id = %id);
            let _entered = span.enter();
            OtpController::spawn(
                delivery.clone(),
                role.clone(),
                self.timings,
                Arc::clone(&self.verifier),
                navigator,
            )
        };

        let session = OtpSession {
            role,
            delivery,
            created_at: Utc::now(),
            started: Instant::now(),
            handle,
            redirect,
            closed_seen: false,
        };
        let view = session.view(id);
        sessions.insert(id, session);

        info!(session_id = %id, role = %view.role, method = %view.method, "otp session opened");
        Ok(view)
    }

    /// Current view of a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown IDs.
    pub async fn view(&self, id: Uuid) -> Result<SessionView, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .map(|s| s.view(id))
            .ok_or(SessionError::NotFound { id })
    }

    /// Handle for a session that still accepts input.
    ///
    /// Mirrors the entry screen disabling its inputs: slot edits and resends
    /// are refused while a verification is in flight or after success.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`] for unknown IDs.
    /// - [`SessionError::InputDisabled`] outside the entering phase.
    pub async fn input(&self, id: Uuid) -> Result<OtpHandle, SessionError> {
        let handle = self.handle(id).await?;
        match handle.snapshot().phase {
            Phase::Entering => Ok(handle),
            Phase::Verifying => Err(SessionError::InputDisabled { phase: "verifying" }),
            Phase::Succeeded => Err(SessionError::InputDisabled { phase: "verified" }),
        }
    }

    /// Handle for a session regardless of phase.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown IDs.
    pub async fn handle(&self, id: Uuid) -> Result<OtpHandle, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .map(|s| s.handle.clone())
            .ok_or(SessionError::NotFound { id })
    }

    /// View of a session after a command, with the redirect refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session was removed meanwhile.
    pub async fn view_with(
        &self,
        id: Uuid,
        snapshot: OtpSnapshot,
    ) -> Result<SessionView, SessionError> {
        let mut view = self.view(id).await?;
        view.state = snapshot;
        Ok(view)
    }

    /// Navigate back to the login screen and discard the session.
    ///
    /// Returns the route the controller navigated to. A verified session is
    /// kept so its dashboard redirect still fires.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`] for unknown IDs.
    /// - [`SessionError::InputDisabled`] once the code has been verified.
    /// - [`SessionError::Otp`] if the controller had already finished; the
    ///   session is discarded in that case.
    pub async fn leave(&self, id: Uuid) -> Result<Route, SessionError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(SessionError::NotFound { id })?;

        let snapshot = session.handle.back().await?;
        if snapshot.verified {
            self.sessions.write().await.insert(id, session);
            return Err(SessionError::InputDisabled { phase: "verified" });
        }
        let route = session
            .redirect
            .borrow()
            .clone()
            .unwrap_or(Route::Login { role: session.role.clone() });

        info!(session_id = %id, target_path = %route, "otp session left");
        Ok(route)
    }

    /// Number of sessions currently held.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are held.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// One reaper pass.
    ///
    /// A finished session is marked on the first pass that sees it closed and
    /// removed on the next, so a polling page has at least one interval to
    /// pick up its redirect. Sessions older than the TTL are removed and
    /// their controllers shut down, cancelling any pending timers.
    pub async fn reap(&self) -> ReapReport {
        let mut report = ReapReport::default();
        let mut expired = Vec::new();

        {
            let mut sessions = self.sessions.write().await;
            sessions.retain(|id, session| {
                if session.started.elapsed() >= self.limits.ttl {
                    expired.push((*id, session.handle.clone()));
                    return false;
                }
                if session.handle.is_closed() {
                    if session.closed_seen {
                        report.finished = report.finished.saturating_add(1);
                        return false;
                    }
                    session.closed_seen = true;
                }
                true
            });
        }

        for (id, handle) in expired {
            report.expired = report.expired.saturating_add(1);
            if handle.shutdown().await.is_ok() {
                info!(session_id = %id, "expired otp session shut down");
            }
        }

        report
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("timings", &self.timings)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
