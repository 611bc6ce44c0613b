//! Where the passcode was sent.
//!
//! The caller picks a [`DeliveryMethod`] and a contact string on the login
//! screen. Both are fixed for the lifetime of an OTP attempt and only used
//! for display text; the contact is not validated here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OtpError;
use crate::otp::OTP_LENGTH;

/// Channel the code was delivered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Email,
    Phone,
}

impl DeliveryMethod {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMethod {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "phone" | "sms" => Ok(Self::Phone),
            other => Err(OtpError::UnknownDeliveryMethod {
                method: other.to_owned(),
            }),
        }
    }
}

/// Immutable delivery details supplied when the entry screen opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryContext {
    method: DeliveryMethod,
    contact: String,
}

impl DeliveryContext {
    #[must_use]
    pub fn new(method: DeliveryMethod, contact: impl Into<String>) -> Self {
        Self {
            method,
            contact: contact.into(),
        }
    }

    #[must_use]
    pub fn method(&self) -> DeliveryMethod {
        self.method
    }

    #[must_use]
    pub fn contact(&self) -> &str {
        &self.contact
    }

    /// Line shown above the slots.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!("We've sent a {OTP_LENGTH}-digit code to {}", self.contact)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_names() {
        assert_eq!("email".parse::<DeliveryMethod>().unwrap(), DeliveryMethod::Email);
        assert_eq!(" Phone ".parse::<DeliveryMethod>().unwrap(), DeliveryMethod::Phone);
        assert_eq!("sms".parse::<DeliveryMethod>().unwrap(), DeliveryMethod::Phone);

        let err = "pigeon".parse::<DeliveryMethod>().unwrap_err();
        assert!(matches!(err, OtpError::UnknownDeliveryMethod { .. }));
    }

    #[test]
    fn prompt_names_the_contact() {
        let ctx = DeliveryContext::new(DeliveryMethod::Email, "asha@example.com");
        assert_eq!(ctx.prompt(), "We've sent a 6-digit code to asha@example.com");
    }

    #[test]
    fn method_serializes_snake_case() {
        let json = serde_json::to_string(&DeliveryMethod::Phone).unwrap();
        assert_eq!(json, "\"phone\"");
    }
}
