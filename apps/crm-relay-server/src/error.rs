//! Error taxonomy for relay requests and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crm_relay_otp::{ChallengeRejection, OtpError, ProofRejection};
use serde::Serialize;
use std::borrow::Cow;
use thiserror::Error;

pub const OTP_NOT_CONFIGURED: &str = "Email verification is not configured on server.";
pub const SEND_CODE_FAILED: &str = "Unable to send verification code right now.";
pub const WORKFLOW_NOT_CONFIGURED: &str = "Server configuration is incomplete.";
pub const DOWNSTREAM_REJECTED: &str = "Unable to process your request right now.";
pub const DOWNSTREAM_UNAVAILABLE: &str = "Submission service is temporarily unavailable.";

/// Everything a relay request can fail with.
///
/// `message` is always safe to return. `detail` is for logs; only a failed
/// code dispatch ever returns it, and only in development mode.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed input, or a rejected token or code.
    #[error("{0}")]
    Validation(Cow<'static, str>),

    /// A secret or endpoint needed for this request is missing.
    #[error("{message} ({detail})")]
    Configuration {
        message: &'static str,
        detail: String,
    },

    /// The code could not be handed to the mail flow.
    #[error("{message} ({detail})")]
    Dispatch {
        message: &'static str,
        detail: String,
    },

    /// The workflow endpoint refused the submission or could not be reached.
    #[error("{message} ({detail})")]
    Downstream {
        message: &'static str,
        detail: String,
    },
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    message: &'a str,
}

impl RelayError {
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: &'static str, detail: impl Into<String>) -> Self {
        Self::Configuration {
            message,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Configuration { .. } | Self::Dispatch { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Downstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable label for logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Configuration { .. } => "configuration",
            Self::Dispatch { .. } => "dispatch",
            Self::Downstream { .. } => "downstream",
        }
    }

    /// The text the caller sees.
    pub fn public_message(&self, expose_detail: bool) -> &str {
        match self {
            Self::Validation(message) => &**message,
            Self::Dispatch { detail, .. } if expose_detail => detail.as_str(),
            Self::Configuration { message, .. }
            | Self::Dispatch { message, .. }
            | Self::Downstream { message, .. } => *message,
        }
    }

    pub fn to_response(&self, expose_detail: bool) -> Response {
        let body = ErrorEnvelope {
            success: false,
            message: self.public_message(expose_detail),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<ChallengeRejection> for RelayError {
    fn from(rejection: ChallengeRejection) -> Self {
        Self::validation(rejection.to_string())
    }
}

impl From<ProofRejection> for RelayError {
    fn from(rejection: ProofRejection) -> Self {
        Self::validation(rejection.to_string())
    }
}

impl From<OtpError> for RelayError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::Rejected(rejection) => rejection.into(),
            OtpError::Token(e) => Self::configuration(OTP_NOT_CONFIGURED, e.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}
