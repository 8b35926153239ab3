//! Email OTP handlers.
//!
//! Neither handler keeps state. Everything needed to check a code travels in
//! the challenge token handed back by `send-email-otp`.

use axum::response::Response;
use chrono::Utc;
use crm_relay_otp::{is_valid_email, mask_email, normalize_email, ChallengeAttempt};
use serde::Serialize;
use serde_json::Value;

use super::{success, text_field};
use crate::email::DispatchError;
use crate::error::{RelayError, SEND_CODE_FAILED};
use crate::metrics::record_outbound_failure;
use crate::server::RelayServer;

const INVALID_EMAIL: &str = "Please provide a valid email address.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CodeSent {
    success: bool,
    message: &'static str,
    verification_token: String,
    expires_in_sec: u64,
    email_masked: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailVerified {
    success: bool,
    message: &'static str,
    verified_at: String,
    proof_token: String,
    expires_in_sec: u64,
}

/// Issue a challenge for `email` and hand its code to the mail flow.
///
/// The token is only returned once the flow has accepted the code.
pub async fn send_email_otp(
    server: &RelayServer,
    payload: Option<&Value>,
) -> Result<Response, RelayError> {
    let email = normalize_email(&text_field(payload, "email"));
    if !is_valid_email(&email) {
        return Err(RelayError::validation(INVALID_EMAIL));
    }

    let otp = server
        .otp_authority()
        .map_err(|_| send_failure("EMAIL_OTP_SECRET is not configured."))?;
    let challenge = otp
        .issue_challenge(&email, Utc::now())
        .map_err(send_failure)?;

    let dispatcher = server
        .otp_dispatcher()
        .ok_or_else(|| send_failure(DispatchError::NotConfigured))?;
    if let Err(e) = dispatcher
        .send_code(&challenge.email, &challenge.code, otp.otp_ttl_secs())
        .await
    {
        if matches!(e, DispatchError::Flow(_)) {
            record_outbound_failure("otp_flow");
        }
        return Err(send_failure(e));
    }

    let email_masked = mask_email(&challenge.email);
    tracing::info!(email = %email_masked, "Verification code sent");

    Ok(success(CodeSent {
        success: true,
        message: "Verification code sent.",
        verification_token: challenge.token,
        expires_in_sec: otp.otp_ttl_secs(),
        email_masked,
    }))
}

/// Check a code against its challenge token and return a proof on success.
pub fn verify_email_otp(
    server: &RelayServer,
    payload: Option<&Value>,
) -> Result<Response, RelayError> {
    let attempt = ChallengeAttempt::parse(
        &text_field(payload, "email"),
        &text_field(payload, "code"),
        &text_field(payload, "verificationToken"),
    )?;

    let otp = server.otp_authority()?;
    let proof = otp.verify_challenge(&attempt, Utc::now())?;

    tracing::info!(email = %mask_email(&proof.email), "Email verified");

    Ok(success(EmailVerified {
        success: true,
        message: "Email verified successfully.",
        verified_at: proof.verified_at,
        proof_token: proof.token,
        expires_in_sec: otp.proof_ttl_secs(),
    }))
}

fn send_failure(err: impl std::fmt::Display) -> RelayError {
    RelayError::Dispatch {
        message: SEND_CODE_FAILED,
        detail: err.to_string(),
    }
}
