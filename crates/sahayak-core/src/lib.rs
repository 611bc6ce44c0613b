//! Core library for `Sahayak`.
//!
//! Contains the one-time passcode entry state machine, the delivery context
//! shown to the user, the navigation and verification seams, and the async
//! controller that owns the resend cool-down and the verify-then-redirect
//! timers. This crate knows nothing about HTTP or page markup.

pub mod controller;
pub mod delivery;
pub mod error;
pub mod navigation;
pub mod otp;
pub mod verifier;
