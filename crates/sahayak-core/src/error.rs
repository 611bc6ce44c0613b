//! Error types for `sahayak-core`.
//!
//! Malformed slot input is not an error: a value longer than one character is
//! silently dropped by the state machine. Errors here only cover caller bugs
//! (bad indices, unknown methods) and talking to a controller that has exited.

/// Errors from OTP entry operations.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    /// The slot index is outside `0..OTP_LENGTH`.
    #[error("slot index {index} is out of range")]
    SlotOutOfRange { index: usize },

    /// The delivery method string is neither `email` nor `phone`.
    #[error("unknown delivery method: {method}")]
    UnknownDeliveryMethod { method: String },

    /// The controller task has exited (verified and redirected, navigated
    /// back, or shut down) and no longer accepts input.
    #[error("otp controller is closed")]
    ControllerClosed,
}
