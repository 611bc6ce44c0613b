//! Async driver for [`OtpState`].
//!
//! One tokio task per OTP attempt owns the state exclusively. Input events
//! arrive over an `mpsc` channel and are applied strictly in delivery order;
//! every command is answered with the resulting [`OtpSnapshot`], and the same
//! snapshot is broadcast on a `watch` channel for renderers that subscribe.
//!
//! The task also owns the three delayed continuations:
//!
//! - the cool-down tick, re-armed every second while the counter is above zero,
//! - the in-flight verification future,
//! - the post-success redirect delay.
//!
//! All three are plain futures held by the task. When the task exits (last
//! handle dropped, [`OtpHandle::shutdown`], [`OtpHandle::back`] before
//! success, or the redirect firing) they are dropped with it, so nothing
//! touches a discarded attempt.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;
use tracing::{debug, info, Instrument};

use crate::delivery::DeliveryContext;
use crate::error::OtpError;
use crate::navigation::{Navigator, Route};
use crate::otp::{Effect, OtpCode, OtpSnapshot, OtpState, SlotIndex, RESEND_COOLDOWN_SECS};
use crate::verifier::{CodeVerifier, VerificationOutcome};

/// Queued commands per controller before senders wait.
const COMMAND_BUFFER: usize = 32;

/// Timer settings for one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpTimings {
    /// Cool-down tick period.
    pub tick: Duration,
    /// Pause between a successful verification and the dashboard redirect.
    pub redirect_delay: Duration,
    /// Cool-down length in ticks, applied at start and on every resend.
    pub resend_cooldown_secs: u32,
}

impl Default for OtpTimings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            redirect_delay: Duration::from_millis(2000),
            resend_cooldown_secs: RESEND_COOLDOWN_SECS,
        }
    }
}

type PendingVerification = Pin<Box<dyn Future<Output = VerificationOutcome> + Send>>;
type Timer = Pin<Box<Sleep>>;

enum Input {
    SetDigit { index: SlotIndex, raw: String },
    Backspace(SlotIndex),
    Submit(Option<OtpCode>),
    Resend,
    Back,
    Shutdown,
}

struct Command {
    input: Input,
    reply: oneshot::Sender<OtpSnapshot>,
}

/// Owns an [`OtpState`] and its timers inside a spawned task.
pub struct OtpController {
    state: OtpState,
    delivery: DeliveryContext,
    role: String,
    timings: OtpTimings,
    verifier: Arc<dyn CodeVerifier>,
    navigator: Arc<dyn Navigator>,
    commands: mpsc::Receiver<Command>,
    published: watch::Sender<OtpSnapshot>,
}

impl OtpController {
    /// Start a fresh entry attempt and return the handle that drives it.
    ///
    /// The task inherits the caller's tracing span. Must be called from
    /// within a tokio runtime.
    pub fn spawn(
        delivery: DeliveryContext,
        role: impl Into<String>,
        timings: OtpTimings,
        verifier: Arc<dyn CodeVerifier>,
        navigator: Arc<dyn Navigator>,
    ) -> OtpHandle {
        let state = OtpState::with_cooldown(timings.resend_cooldown_secs);
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (published, snapshots) = watch::channel(state.snapshot());

        let controller = Self {
            state,
            delivery,
            role: role.into(),
            timings,
            verifier,
            navigator,
            commands,
            published,
        };
        tokio::spawn(controller.run().in_current_span());

        OtpHandle {
            commands: commands_tx,
            snapshots,
        }
    }

    async fn run(mut self) {
        info!(
            role = %self.role,
            method = %self.delivery.method(),
            cooldown_secs = self.timings.resend_cooldown_secs,
            "otp entry started"
        );

        let mut countdown = self.countdown_timer();
        let mut verification: Option<PendingVerification> = None;
        let mut redirect: Option<Timer> = None;

        loop {
            tokio::select! {
                biased;

                () = armed(&mut countdown) => {
                    countdown = if self.state.tick() {
                        Some(Box::pin(tokio::time::sleep(self.timings.tick)))
                    } else {
                        debug!("resend cool-down elapsed");
                        None
                    };
                    self.publish();
                }

                outcome = armed(&mut verification) => {
                    verification = None;
                    if let VerificationOutcome::Failed { reason } = &outcome {
                        info!(reason = %reason, "otp verification failed");
                    }
                    if self.state.finish_verification(outcome) == Effect::ScheduleNavigation {
                        info!(
                            redirect_ms = u64::try_from(self.timings.redirect_delay.as_millis())
                                .unwrap_or(u64::MAX),
                            "otp verified, redirect scheduled"
                        );
                        countdown = None;
                        redirect = Some(Box::pin(tokio::time::sleep(self.timings.redirect_delay)));
                    }
                    self.publish();
                }

                () = armed(&mut redirect) => {
                    let route = Route::Dashboard { role: self.role.clone() };
                    info!(target_path = %route, "redirecting after verification");
                    self.navigator.navigate(route);
                    break;
                }

                command = self.commands.recv() => {
                    let Some(Command { input, reply }) = command else {
                        debug!("all handles dropped");
                        break;
                    };
                    match input {
                        Input::Back if self.state.verified() => {
                            debug!("back ignored, redirect pending");
                        }
                        Input::Back => {
                            let route = Route::Login { role: self.role.clone() };
                            info!(target_path = %route, "navigating back from otp entry");
                            self.navigator.navigate(route);
                            let _ = reply.send(self.state.snapshot());
                            break;
                        }
                        Input::Shutdown => {
                            let _ = reply.send(self.state.snapshot());
                            break;
                        }
                        Input::Resend => {
                            // Slots stay put while a check is in flight.
                            if !self.state.verifying() && self.state.resend() {
                                info!("otp resent, cool-down restarted");
                                countdown = self.countdown_timer();
                            }
                        }
                        input => {
                            if let Effect::StartVerification(code) = self.apply(input) {
                                info!(complete = code.is_complete(), "otp submitted");
                                verification = Some(self.verify(code));
                            }
                        }
                    }
                    self.publish();
                    let _ = reply.send(self.state.snapshot());
                }
            }
        }

        info!(verified = self.state.verified(), "otp entry closed");
    }

    fn apply(&mut self, input: Input) -> Effect {
        match input {
            Input::SetDigit { index, raw } => self.state.set_digit(index, &raw),
            Input::Backspace(index) => {
                self.state.backspace(index);
                Effect::None
            }
            Input::Submit(Some(code)) => self.state.submit_code(code),
            Input::Submit(None) => self.state.submit(),
            Input::Resend | Input::Back | Input::Shutdown => Effect::None,
        }
    }

    fn countdown_timer(&self) -> Option<Timer> {
        (self.state.seconds_until_resend() > 0 && !self.state.verified())
            .then(|| Box::pin(tokio::time::sleep(self.timings.tick)))
    }

    fn verify(&self, code: OtpCode) -> PendingVerification {
        let verifier = Arc::clone(&self.verifier);
        let delivery = self.delivery.clone();
        Box::pin(async move { verifier.verify(&code, &delivery).await })
    }

    fn publish(&self) {
        self.published.send_replace(self.state.snapshot());
    }
}

impl std::fmt::Debug for OtpController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpController")
            .field("role", &self.role)
            .field("phase", &self.state.phase())
            .finish_non_exhaustive()
    }
}

/// Resolve the slot's future, or never if the slot is empty.
async fn armed<F>(slot: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match slot.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

/// Input side of a running [`OtpController`].
///
/// Cheap to clone. The controller stops once every clone is dropped.
#[derive(Clone)]
pub struct OtpHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<OtpSnapshot>,
}

impl OtpHandle {
    /// Write `raw` into slot `index`.
    ///
    /// # Errors
    ///
    /// - [`OtpError::SlotOutOfRange`] if `index` is not a slot.
    /// - [`OtpError::ControllerClosed`] if the controller has exited.
    pub async fn set_digit(&self, index: usize, raw: &str) -> Result<OtpSnapshot, OtpError> {
        let index = SlotIndex::new(index)?;
        self.send(Input::SetDigit {
            index,
            raw: raw.to_owned(),
        })
        .await
    }

    /// Backspace pressed on slot `index`.
    ///
    /// # Errors
    ///
    /// - [`OtpError::SlotOutOfRange`] if `index` is not a slot.
    /// - [`OtpError::ControllerClosed`] if the controller has exited.
    pub async fn backspace(&self, index: usize) -> Result<OtpSnapshot, OtpError> {
        let index = SlotIndex::new(index)?;
        self.send(Input::Backspace(index)).await
    }

    /// Submit the current slot contents.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::ControllerClosed`] if the controller has exited.
    pub async fn submit(&self) -> Result<OtpSnapshot, OtpError> {
        self.send(Input::Submit(None)).await
    }

    /// Submit an explicit code.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::ControllerClosed`] if the controller has exited.
    pub async fn submit_code(&self, code: OtpCode) -> Result<OtpSnapshot, OtpError> {
        self.send(Input::Submit(Some(code))).await
    }

    /// Request a new code; ignored while the cool-down is running.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::ControllerClosed`] if the controller has exited.
    pub async fn resend(&self) -> Result<OtpSnapshot, OtpError> {
        self.send(Input::Resend).await
    }

    /// Leave the entry screen for the role's login view and stop the
    /// controller, cancelling any pending timers.
    ///
    /// Ignored once verified; the dashboard redirect still fires.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::ControllerClosed`] if the controller has exited.
    pub async fn back(&self) -> Result<OtpSnapshot, OtpError> {
        self.send(Input::Back).await
    }

    /// Stop the controller without navigating.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::ControllerClosed`] if the controller has already exited.
    pub async fn shutdown(&self) -> Result<OtpSnapshot, OtpError> {
        self.send(Input::Shutdown).await
    }

    /// Latest published state. Still readable after the controller exits.
    #[must_use]
    pub fn snapshot(&self) -> OtpSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that wakes on every published change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OtpSnapshot> {
        self.snapshots.clone()
    }

    /// Whether the controller task has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Wait until the controller task has exited.
    pub async fn closed(&self) {
        self.commands.closed().await;
    }

    async fn send(&self, input: Input) -> Result<OtpSnapshot, OtpError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command { input, reply })
            .await
            .map_err(|_| OtpError::ControllerClosed)?;
        response.await.map_err(|_| OtpError::ControllerClosed)
    }
}

impl std::fmt::Debug for OtpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpHandle")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tokio::time::sleep;

    use super::*;
    use crate::delivery::DeliveryMethod;
    use crate::otp::Phase;
    use crate::verifier::SimulatedVerifier;

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<Route>>,
    }

    impl RecordingNavigator {
        fn routes(&self) -> Vec<Route> {
            self.routes.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: Route) {
            self.routes.lock().unwrap().push(route);
        }
    }

    /// Counts calls and answers with a fixed outcome after the default latency.
    struct ScriptedVerifier {
        calls: AtomicUsize,
        outcome: VerificationOutcome,
    }

    impl ScriptedVerifier {
        fn new(outcome: VerificationOutcome) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CodeVerifier for ScriptedVerifier {
        async fn verify(&self, _code: &OtpCode, _delivery: &DeliveryContext) -> VerificationOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(SimulatedVerifier::DEFAULT_LATENCY).await;
            self.outcome.clone()
        }
    }

    fn delivery() -> DeliveryContext {
        DeliveryContext::new(DeliveryMethod::Email, "asha@example.com")
    }

    fn start(
        verifier: Arc<dyn CodeVerifier>,
    ) -> (OtpHandle, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        let handle = OtpController::spawn(
            delivery(),
            "student",
            OtpTimings::default(),
            verifier,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );
        (handle, navigator)
    }

    async fn enter(handle: &OtpHandle, values: &[&str]) -> OtpSnapshot {
        let mut last = handle.snapshot();
        for (i, value) in values.iter().enumerate() {
            last = handle.set_digit(i, value).await.unwrap();
        }
        last
    }

    // ── countdown ────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_once_per_second() {
        let (handle, _nav) = start(Arc::new(SimulatedVerifier::default()));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.snapshot().seconds_until_resend, 30);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.snapshot().seconds_until_resend, 29);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.snapshot().seconds_until_resend, 24);
        assert!(!handle.snapshot().resend_allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn resend_unlocks_after_thirty_ticks_and_stays_at_zero() {
        let (handle, _nav) = start(Arc::new(SimulatedVerifier::default()));

        sleep(Duration::from_millis(30_500)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.seconds_until_resend, 0);
        assert!(snap.resend_allowed);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.snapshot().seconds_until_resend, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resend_restarts_cooldown() {
        let (handle, _nav) = start(Arc::new(SimulatedVerifier::default()));

        let early = handle.resend().await.unwrap();
        assert_eq!(early.seconds_until_resend, 30);

        sleep(Duration::from_millis(30_500)).await;
        handle.set_digit(0, "4").await.unwrap();
        let snap = handle.resend().await.unwrap();
        assert_eq!(snap.seconds_until_resend, 30);
        assert!(!snap.resend_allowed);
        assert_eq!(snap.digits, vec![""; 6]);
        assert_eq!(snap.active_slot, Some(0));

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(handle.snapshot().seconds_until_resend, 29);
    }

    // ── submit and redirect ──────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn sixth_digit_submits_then_redirects_once() {
        let verifier = Arc::new(ScriptedVerifier::new(VerificationOutcome::Succeeded));
        let (handle, nav) = start(Arc::clone(&verifier) as Arc<dyn CodeVerifier>);

        let fifth = enter(&handle, &["1", "2", "3", "4", "5"]).await;
        assert!(!fifth.verifying);

        let sixth = handle.set_digit(5, "9").await.unwrap();
        assert!(sixth.verifying);
        assert_eq!(sixth.phase, Phase::Verifying);

        // Refilling while verifying must not start a second check.
        handle.set_digit(5, "8").await.unwrap();
        handle.submit().await.unwrap();

        sleep(Duration::from_millis(1_600)).await;
        let snap = handle.snapshot();
        assert!(snap.verified);
        assert_eq!(snap.phase, Phase::Succeeded);
        assert!(nav.routes().is_empty());

        sleep(Duration::from_secs(2)).await;
        handle.closed().await;
        assert_eq!(
            nav.routes(),
            vec![Route::Dashboard { role: "student".to_owned() }]
        );
        assert_eq!(verifier.calls(), 1);
        assert!(matches!(
            handle.set_digit(0, "1").await,
            Err(OtpError::ControllerClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_stops_after_success() {
        let (handle, _nav) = start(Arc::new(SimulatedVerifier::default()));

        handle.submit_code(OtpCode::new("123456")).await.unwrap();
        sleep(Duration::from_millis(1_600)).await;
        let frozen = handle.snapshot().seconds_until_resend;

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(handle.snapshot().seconds_until_resend, frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_verification_returns_to_entry() {
        let verifier = Arc::new(ScriptedVerifier::new(VerificationOutcome::Failed {
            reason: "incorrect code".to_owned(),
        }));
        let (handle, nav) = start(Arc::clone(&verifier) as Arc<dyn CodeVerifier>);

        enter(&handle, &["0", "0", "0", "0", "0", "0"]).await;
        sleep(Duration::from_millis(1_600)).await;

        let snap = handle.snapshot();
        assert_eq!(snap.phase, Phase::Entering);
        assert!(!snap.verifying);
        assert_eq!(snap.digits, vec![""; 6]);
        assert_eq!(snap.error.as_deref(), Some("incorrect code"));

        let again = enter(&handle, &["1", "1", "1", "1", "1", "1"]).await;
        assert!(again.verifying);
        assert_eq!(again.error, None);
        assert_eq!(verifier.calls(), 2);
        assert!(nav.routes().is_empty());
    }

    // ── teardown ─────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_pending_redirect() {
        let (handle, nav) = start(Arc::new(SimulatedVerifier::default()));

        enter(&handle, &["1", "2", "3", "4", "5", "6"]).await;
        let watcher = handle.subscribe();
        drop(handle);

        sleep(Duration::from_secs(10)).await;
        assert!(nav.routes().is_empty());
        assert!(!watcher.borrow().verified);
    }

    #[tokio::test(start_paused = true)]
    async fn back_navigates_to_login_and_closes() {
        let (handle, nav) = start(Arc::new(SimulatedVerifier::default()));

        handle.set_digit(0, "1").await.unwrap();
        handle.back().await.unwrap();
        handle.closed().await;

        assert_eq!(nav.routes(), vec![Route::Login { role: "student".to_owned() }]);
        assert!(handle.is_closed());
        assert!(matches!(handle.resend().await, Err(OtpError::ControllerClosed)));

        sleep(Duration::from_secs(60)).await;
        assert_eq!(nav.routes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn back_after_success_keeps_dashboard_redirect() {
        let (handle, nav) = start(Arc::new(SimulatedVerifier::default()));

        enter(&handle, &["1", "2", "3", "4", "5", "6"]).await;
        sleep(Duration::from_millis(1_600)).await;
        assert!(handle.snapshot().verified);

        let snap = handle.back().await.unwrap();
        assert!(snap.verified);
        assert!(!handle.is_closed());

        sleep(Duration::from_secs(5)).await;
        handle.closed().await;
        assert_eq!(
            nav.routes(),
            vec![Route::Dashboard { role: "student".to_owned() }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resend_is_refused_while_verifying() {
        let navigator = Arc::new(RecordingNavigator::default());
        let handle = OtpController::spawn(
            delivery(),
            "student",
            OtpTimings {
                resend_cooldown_secs: 0,
                ..OtpTimings::default()
            },
            Arc::new(SimulatedVerifier::default()),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );

        let filled = enter(&handle, &["1", "2", "3", "4", "5", "6"]).await;
        assert!(filled.verifying);
        assert!(filled.resend_allowed);

        let snap = handle.resend().await.unwrap();
        assert!(snap.verifying);
        assert_eq!(snap.digits, vec!["1", "2", "3", "4", "5", "6"]);

        sleep(Duration::from_millis(1_600)).await;
        assert!(handle.snapshot().verified);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_slot_is_rejected_before_sending() {
        let (handle, _nav) = start(Arc::new(SimulatedVerifier::default()));

        let err = handle.set_digit(6, "1").await.unwrap_err();
        assert!(matches!(err, OtpError::SlotOutOfRange { index: 6 }));
        assert!(handle.backspace(9).await.is_err());
        assert!(!handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn backspace_moves_focus_through_handle() {
        let (handle, _nav) = start(Arc::new(SimulatedVerifier::default()));

        assert_eq!(handle.backspace(3).await.unwrap().active_slot, Some(2));
        let snap = handle.backspace(0).await.unwrap();
        assert_eq!(snap.active_slot, Some(2));
    }
}
