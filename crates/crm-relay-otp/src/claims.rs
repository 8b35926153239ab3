//! Token claim shapes.
//!
//! Both token kinds share one signing key, so the `purpose` tag is what keeps a
//! challenge from being replayed as a proof and vice versa.

use serde::{Deserialize, Serialize};

pub const PURPOSE_EMAIL_OTP: &str = "email-otp";
pub const PURPOSE_EMAIL_VERIFIED: &str = "email-verified";

/// Any claim set this crate signs, discriminated by `purpose`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose")]
pub enum Claims {
    #[serde(rename = "email-otp")]
    Challenge(ChallengeClaims),
    #[serde(rename = "email-verified")]
    Proof(ProofClaims),
}

/// Outstanding OTP challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeClaims {
    pub email: String,
    /// Expiry, milliseconds since the Unix epoch.
    pub exp: i64,
    pub nonce: String,
    pub otp_hash: String,
}

/// Completed verification of an email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofClaims {
    pub email: String,
    /// RFC 3339, UTC, millisecond precision.
    pub verified_at: String,
    /// Expiry, milliseconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    pub fn purpose(&self) -> &'static str {
        match self {
            Self::Challenge(_) => PURPOSE_EMAIL_OTP,
            Self::Proof(_) => PURPOSE_EMAIL_VERIFIED,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Self::Challenge(c) => &c.email,
            Self::Proof(p) => &p.email,
        }
    }

    pub fn exp(&self) -> i64 {
        match self {
            Self::Challenge(c) => c.exp,
            Self::Proof(p) => p.exp,
        }
    }

    /// A token is still valid at the exact millisecond of its expiry.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.exp() < now_ms
    }
}
