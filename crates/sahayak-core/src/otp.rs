//! One-time passcode entry state machine.
//!
//! [`OtpState`] owns the six single-character slots, the focus cursor, the
//! resend cool-down counter, and the verification flags. It never sleeps or
//! schedules anything itself: operations that need a delayed continuation
//! return an [`Effect`] and the caller (see [`crate::controller`]) arms the
//! matching timer.
//!
//! ```text
//! Entering ──submit / sixth slot filled──▶ Verifying ──Succeeded──▶ Succeeded
//!    ▲                                        │
//!    └────────────────Failed──────────────────┘
//! ```
//!
//! Slot contents are not restricted to numerals. Any single character is
//! accepted, which matches the permissive input handling of the web form;
//! filtering belongs to whichever verifier is plugged in.

use std::fmt;

use serde::Serialize;

use crate::error::OtpError;
use crate::verifier::VerificationOutcome;

/// Number of slots in a passcode.
pub const OTP_LENGTH: usize = 6;

/// Seconds a freshly issued code must wait before another can be requested.
pub const RESEND_COOLDOWN_SECS: u32 = 30;

/// A validated slot position in `0..OTP_LENGTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotIndex(usize);

impl SlotIndex {
    /// The leftmost slot, focused when the screen opens and after a resend.
    pub const FIRST: Self = Self(0);

    /// Validate a raw index.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::SlotOutOfRange`] if `index >= OTP_LENGTH`.
    pub fn new(index: usize) -> Result<Self, OtpError> {
        if index < OTP_LENGTH {
            Ok(Self(index))
        } else {
            Err(OtpError::SlotOutOfRange { index })
        }
    }

    /// The raw position.
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }

    fn next(self) -> Option<Self> {
        let next = self.0.saturating_add(1);
        (next < OTP_LENGTH).then_some(Self(next))
    }

    fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl TryFrom<usize> for SlotIndex {
    type Error = OtpError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A code handed to the verifier.
///
/// `Debug` output is redacted so codes never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Wrap a code string as entered.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code has exactly [`OTP_LENGTH`] characters.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.0.chars().count() == OTP_LENGTH
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OtpCode").field(&"[redacted]").finish()
    }
}

/// Coarse lifecycle stage, derived from the verification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Accepting slot edits, backspace focus moves, and resends.
    Entering,
    /// A verification is in flight.
    Verifying,
    /// Verified. Terminal; the redirect is pending or done.
    Succeeded,
}

/// Follow-up work an operation asks the controller to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to schedule.
    None,
    /// Run the verifier against this code.
    StartVerification(OtpCode),
    /// Arm the post-success redirect delay.
    ScheduleNavigation,
}

/// Mutable state of one OTP entry attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpState {
    digits: [Option<char>; OTP_LENGTH],
    active_slot: Option<SlotIndex>,
    seconds_until_resend: u32,
    resend_allowed: bool,
    verifying: bool,
    verified: bool,
    last_error: Option<String>,
    cooldown_secs: u32,
}

impl OtpState {
    /// Fresh state with the standard 30-second resend cool-down.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cooldown(RESEND_COOLDOWN_SECS)
    }

    /// Fresh state with a custom cool-down. A zero cool-down allows resending
    /// immediately.
    #[must_use]
    pub fn with_cooldown(cooldown_secs: u32) -> Self {
        Self {
            digits: [None; OTP_LENGTH],
            active_slot: Some(SlotIndex::FIRST),
            seconds_until_resend: cooldown_secs,
            resend_allowed: cooldown_secs == 0,
            verifying: false,
            verified: false,
            last_error: None,
            cooldown_secs,
        }
    }

    // ── Input operations ─────────────────────────────────────────────

    /// Write `raw` into the slot at `index`.
    ///
    /// Input longer than one character is ignored outright. A non-empty value
    /// moves focus to the following slot (the last slot keeps focus). When
    /// every slot is filled and no verification is running, the code is
    /// submitted automatically.
    pub fn set_digit(&mut self, index: SlotIndex, raw: &str) -> Effect {
        if self.verified {
            return Effect::None;
        }

        let mut chars = raw.chars();
        let value = chars.next();
        if chars.next().is_some() {
            return Effect::None;
        }

        self.digits[index.get()] = value;

        if value.is_some() {
            if let Some(next) = index.next() {
                self.active_slot = Some(next);
            }
        }

        if self.is_complete() && !self.verifying {
            return self.submit();
        }

        Effect::None
    }

    /// Handle a backspace keypress on `index`.
    ///
    /// Only moves focus: an empty slot hands focus to its left neighbour so
    /// the next backspace clears that one. Clearing a character is an
    /// ordinary [`set_digit`](Self::set_digit) with an empty value.
    pub fn backspace(&mut self, index: SlotIndex) {
        if self.verified || self.digits[index.get()].is_some() {
            return;
        }
        if let Some(prev) = index.prev() {
            self.active_slot = Some(prev);
        }
    }

    /// Submit the current slot contents.
    pub fn submit(&mut self) -> Effect {
        let code = self.code();
        self.submit_code(code)
    }

    /// Submit an explicit code instead of the slot contents.
    ///
    /// No-op while a verification is already in flight or after success.
    pub fn submit_code(&mut self, code: OtpCode) -> Effect {
        if self.verifying || self.verified {
            return Effect::None;
        }
        self.verifying = true;
        self.last_error = None;
        Effect::StartVerification(code)
    }

    /// Request a new code. Returns `true` if the resend took effect.
    ///
    /// Only effective once the cool-down has elapsed. Restarts the cool-down,
    /// clears every slot, and focuses the first slot. The verification flags
    /// are left alone: the rendering layer disables input while verifying, so
    /// a resend never races an in-flight check.
    pub fn resend(&mut self) -> bool {
        if !self.resend_allowed || self.verified {
            return false;
        }
        self.seconds_until_resend = self.cooldown_secs;
        self.resend_allowed = self.cooldown_secs == 0;
        self.digits = [None; OTP_LENGTH];
        self.active_slot = Some(SlotIndex::FIRST);
        true
    }

    /// Advance the cool-down by one second.
    ///
    /// Returns `true` while another tick is needed. Idempotent at zero and
    /// inert once verified.
    pub fn tick(&mut self) -> bool {
        if self.verified {
            return false;
        }
        self.seconds_until_resend = self.seconds_until_resend.saturating_sub(1);
        if self.seconds_until_resend == 0 {
            self.resend_allowed = true;
            return false;
        }
        true
    }

    /// Apply the verifier's verdict.
    ///
    /// Success is terminal and asks for the redirect delay. Failure returns to
    /// entry with every slot cleared and the reason kept for display.
    /// Outcomes arriving when nothing is being verified are ignored.
    pub fn finish_verification(&mut self, outcome: VerificationOutcome) -> Effect {
        if !self.verifying || self.verified {
            return Effect::None;
        }
        match outcome {
            VerificationOutcome::Succeeded => {
                self.verified = true;
                Effect::ScheduleNavigation
            }
            VerificationOutcome::Failed { reason } => {
                self.verifying = false;
                self.digits = [None; OTP_LENGTH];
                self.active_slot = Some(SlotIndex::FIRST);
                self.last_error = Some(reason);
                Effect::None
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Contents of one slot.
    #[must_use]
    pub fn digit(&self, index: SlotIndex) -> Option<char> {
        self.digits[index.get()]
    }

    /// Contents of every slot, left to right.
    #[must_use]
    pub fn digits(&self) -> [Option<char>; OTP_LENGTH] {
        self.digits
    }

    /// The slot that should hold keyboard focus.
    #[must_use]
    pub fn active_slot(&self) -> Option<SlotIndex> {
        self.active_slot
    }

    #[must_use]
    pub fn seconds_until_resend(&self) -> u32 {
        self.seconds_until_resend
    }

    #[must_use]
    pub fn resend_allowed(&self) -> bool {
        self.resend_allowed
    }

    #[must_use]
    pub fn verifying(&self) -> bool {
        self.verifying
    }

    #[must_use]
    pub fn verified(&self) -> bool {
        self.verified
    }

    /// Reason of the most recent failed verification, cleared on submit.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.verified {
            Phase::Succeeded
        } else if self.verifying {
            Phase::Verifying
        } else {
            Phase::Entering
        }
    }

    /// Whether every slot holds a character.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.digits.iter().all(Option::is_some)
    }

    /// The slot contents concatenated left to right.
    #[must_use]
    pub fn code(&self) -> OtpCode {
        OtpCode(self.digits.iter().flatten().collect())
    }

    /// Render-ready copy of the state.
    #[must_use]
    pub fn snapshot(&self) -> OtpSnapshot {
        OtpSnapshot {
            digits: self
                .digits
                .iter()
                .map(|d| d.map(String::from).unwrap_or_default())
                .collect(),
            active_slot: self.active_slot.map(SlotIndex::get),
            seconds_until_resend: self.seconds_until_resend,
            resend_allowed: self.resend_allowed,
            verifying: self.verifying,
            verified: self.verified,
            phase: self.phase(),
            error: self.last_error.clone(),
        }
    }
}

impl Default for OtpState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the rendering layer reads back after every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpSnapshot {
    /// One entry per slot; empty string for an empty slot.
    pub digits: Vec<String>,
    pub active_slot: Option<usize>,
    pub seconds_until_resend: u32,
    pub resend_allowed: bool,
    pub verifying: bool,
    pub verified: bool,
    pub phase: Phase,
    pub error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn slot(i: usize) -> SlotIndex {
        SlotIndex::new(i).unwrap()
    }

    fn fill(state: &mut OtpState, values: &[&str]) -> Vec<Effect> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| state.set_digit(slot(i), v))
            .collect()
    }

    // ── SlotIndex ────────────────────────────────────────────────────

    #[test]
    fn slot_index_rejects_out_of_range() {
        assert!(SlotIndex::new(5).is_ok());
        let err = SlotIndex::new(OTP_LENGTH).unwrap_err();
        assert!(matches!(err, OtpError::SlotOutOfRange { index: 6 }));
    }

    // ── initial state ────────────────────────────────────────────────

    #[test]
    fn fresh_state_matches_lifecycle_defaults() {
        let state = OtpState::new();
        assert_eq!(state.digits(), [None; OTP_LENGTH]);
        assert_eq!(state.seconds_until_resend(), 30);
        assert!(!state.resend_allowed());
        assert!(!state.verifying());
        assert!(!state.verified());
        assert_eq!(state.active_slot(), Some(SlotIndex::FIRST));
        assert_eq!(state.phase(), Phase::Entering);
    }

    #[test]
    fn zero_cooldown_allows_resend_immediately() {
        let state = OtpState::with_cooldown(0);
        assert!(state.resend_allowed());
    }

    // ── set_digit ────────────────────────────────────────────────────

    #[test]
    fn single_character_is_stored_in_every_slot() {
        for i in 0..OTP_LENGTH {
            let mut state = OtpState::new();
            state.set_digit(slot(i), "7");
            assert_eq!(state.digit(slot(i)), Some('7'));
        }
    }

    #[test]
    fn multi_character_input_is_ignored() {
        let mut state = OtpState::new();
        state.set_digit(slot(2), "4");
        let before = state.clone();

        assert_eq!(state.set_digit(slot(2), "ab"), Effect::None);
        assert_eq!(state, before);
    }

    #[test]
    fn length_is_counted_in_characters_not_bytes() {
        let mut state = OtpState::new();
        state.set_digit(slot(0), "é");
        assert_eq!(state.digit(slot(0)), Some('é'));
    }

    #[test]
    fn non_numeral_characters_are_accepted() {
        let mut state = OtpState::new();
        state.set_digit(slot(0), "x");
        assert_eq!(state.digit(slot(0)), Some('x'));
    }

    #[test]
    fn entry_advances_focus_until_last_slot() {
        let mut state = OtpState::new();
        for i in 0..OTP_LENGTH - 1 {
            state.set_digit(slot(i), "1");
            assert_eq!(state.active_slot(), Some(slot(i + 1)));
        }

        let mut state = OtpState::new();
        state.set_digit(slot(3), "1");
        state.set_digit(slot(5), "1");
        assert_eq!(state.active_slot(), Some(slot(3 + 1)));
    }

    #[test]
    fn clearing_a_slot_keeps_focus() {
        let mut state = OtpState::new();
        state.set_digit(slot(1), "1");
        assert_eq!(state.active_slot(), Some(slot(2)));
        state.set_digit(slot(1), "");
        assert_eq!(state.digit(slot(1)), None);
        assert_eq!(state.active_slot(), Some(slot(2)));
    }

    #[test]
    fn sixth_slot_auto_submits() {
        let mut state = OtpState::new();
        let effects = fill(&mut state, &["1", "2", "3", "4", "5", "9"]);

        assert!(effects[..5].iter().all(|e| *e == Effect::None));
        assert_eq!(
            effects[5],
            Effect::StartVerification(OtpCode::new("123459"))
        );
        assert!(state.verifying());
        assert_eq!(state.phase(), Phase::Verifying);
    }

    #[test]
    fn refilling_while_verifying_does_not_resubmit() {
        let mut state = OtpState::new();
        fill(&mut state, &["1", "2", "3", "4", "5", "6"]);
        assert!(state.verifying());

        assert_eq!(state.set_digit(slot(5), "7"), Effect::None);
        assert_eq!(state.set_digit(slot(0), "8"), Effect::None);
        assert_eq!(state.submit(), Effect::None);
    }

    // ── backspace ────────────────────────────────────────────────────

    #[test]
    fn backspace_on_empty_slot_moves_focus_left() {
        let mut state = OtpState::new();
        state.backspace(slot(3));
        assert_eq!(state.active_slot(), Some(slot(2)));
    }

    #[test]
    fn backspace_on_first_slot_keeps_focus() {
        let mut state = OtpState::new();
        state.set_digit(slot(2), "1");
        state.set_digit(slot(2), "");
        let focus = state.active_slot();
        state.backspace(slot(0));
        assert_eq!(state.active_slot(), focus);
    }

    #[test]
    fn backspace_on_filled_slot_does_nothing() {
        let mut state = OtpState::new();
        state.set_digit(slot(3), "1");
        let before = state.clone();
        state.backspace(slot(3));
        assert_eq!(state, before);
    }

    // ── submit ───────────────────────────────────────────────────────

    #[test]
    fn explicit_submit_uses_code_override() {
        let mut state = OtpState::new();
        let effect = state.submit_code(OtpCode::new("000000"));
        assert_eq!(effect, Effect::StartVerification(OtpCode::new("000000")));
        assert_eq!(state.submit_code(OtpCode::new("111111")), Effect::None);
    }

    #[test]
    fn code_debug_is_redacted() {
        let rendered = format!("{:?}", OtpCode::new("123456"));
        assert!(!rendered.contains("123456"));
    }

    // ── resend ───────────────────────────────────────────────────────

    #[test]
    fn resend_before_cooldown_is_a_noop() {
        let mut state = OtpState::new();
        state.set_digit(slot(0), "1");
        state.tick();
        let before = state.clone();

        assert!(!state.resend());
        assert_eq!(state, before);
    }

    #[test]
    fn resend_after_cooldown_resets_entry() {
        let mut state = OtpState::new();
        while state.tick() {}
        state.set_digit(slot(0), "1");
        state.set_digit(slot(1), "2");

        assert!(state.resend());
        assert_eq!(state.digits(), [None; OTP_LENGTH]);
        assert_eq!(state.seconds_until_resend(), 30);
        assert!(!state.resend_allowed());
        assert_eq!(state.active_slot(), Some(SlotIndex::FIRST));
    }

    // ── countdown ────────────────────────────────────────────────────

    #[test]
    fn countdown_decrements_by_one_until_zero() {
        let mut state = OtpState::new();
        for expected in (0..30).rev() {
            let rearm = state.tick();
            assert_eq!(state.seconds_until_resend(), expected);
            assert_eq!(rearm, expected > 0);
            assert_eq!(state.resend_allowed(), expected == 0);
        }

        assert!(!state.tick());
        assert_eq!(state.seconds_until_resend(), 0);
        assert!(state.resend_allowed());
    }

    #[test]
    fn countdown_freezes_once_verified() {
        let mut state = OtpState::new();
        state.submit();
        state.finish_verification(VerificationOutcome::Succeeded);
        assert!(!state.tick());
        assert_eq!(state.seconds_until_resend(), 30);
    }

    // ── verification outcome ─────────────────────────────────────────

    #[test]
    fn success_is_terminal() {
        let mut state = OtpState::new();
        fill(&mut state, &["1", "2", "3", "4", "5", "6"]);

        let effect = state.finish_verification(VerificationOutcome::Succeeded);
        assert_eq!(effect, Effect::ScheduleNavigation);
        assert!(state.verified());
        assert_eq!(state.phase(), Phase::Succeeded);

        let before = state.clone();
        state.set_digit(slot(0), "");
        state.backspace(slot(1));
        assert_eq!(state.submit(), Effect::None);
        assert_eq!(state, before);
    }

    #[test]
    fn failure_returns_to_entry_with_message() {
        let mut state = OtpState::new();
        fill(&mut state, &["9", "9", "9", "9", "9", "9"]);

        let effect = state.finish_verification(VerificationOutcome::Failed {
            reason: "code expired".to_owned(),
        });
        assert_eq!(effect, Effect::None);
        assert_eq!(state.phase(), Phase::Entering);
        assert_eq!(state.digits(), [None; OTP_LENGTH]);
        assert_eq!(state.active_slot(), Some(SlotIndex::FIRST));
        assert_eq!(state.last_error(), Some("code expired"));

        let effects = fill(&mut state, &["1", "2", "3", "4", "5", "6"]);
        assert!(matches!(effects[5], Effect::StartVerification(_)));
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn stray_outcome_is_ignored() {
        let mut state = OtpState::new();
        let before = state.clone();
        assert_eq!(
            state.finish_verification(VerificationOutcome::Succeeded),
            Effect::None
        );
        assert_eq!(state, before);
    }

    // ── snapshot ─────────────────────────────────────────────────────

    #[test]
    fn snapshot_renders_empty_slots_as_empty_strings() {
        let mut state = OtpState::new();
        state.set_digit(slot(1), "4");
        let snap = state.snapshot();
        assert_eq!(snap.digits, vec!["", "4", "", "", "", ""]);
        assert_eq!(snap.active_slot, Some(2));

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["phase"], "entering");
        assert_eq!(json["seconds_until_resend"], 30);
    }
}
