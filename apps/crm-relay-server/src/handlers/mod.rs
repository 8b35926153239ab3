//! HTTP surface of the relay.
//!
//! A single endpoint, routed by the `action` field of the JSON body:
//! - verification: `send-email-otp`, `verify-email-otp`
//! - submission: everything else, including a missing action
//!
//! `OPTIONS` is the preflight; any other method is handled like `POST`.

pub mod submission;
pub mod verification;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{middleware, Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use crate::error::RelayError;
use crate::metrics::record_request;
use crate::server::RelayServer;

pub const CRM_REQUEST_PATH: &str = "/api/crm-request";

const INVALID_JSON: &str = "Invalid JSON payload.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SendEmailOtp,
    VerifyEmailOtp,
    Submit,
}

impl Action {
    /// Unknown and missing actions both mean submit.
    pub fn from_payload(payload: Option<&Value>) -> Self {
        match text_field(payload, "action").trim() {
            "send-email-otp" => Self::SendEmailOtp,
            "verify-email-otp" => Self::VerifyEmailOtp,
            _ => Self::Submit,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::SendEmailOtp => "send-email-otp",
            Self::VerifyEmailOtp => "verify-email-otp",
            Self::Submit => "submit",
        }
    }
}

pub fn router(server: RelayServer) -> Router {
    Router::new()
        .route(
            CRM_REQUEST_PATH,
            post(crm_request).options(preflight).fallback(crm_request),
        )
        .layer(middleware::map_response(apply_cors_headers))
        .with_state(server)
}

async fn crm_request(State(server): State<RelayServer>, body: Bytes) -> Response {
    let started = Instant::now();
    let mut label = "invalid";

    let result = match parse_body(&body) {
        Ok(payload) => {
            let action = Action::from_payload(payload.as_ref());
            label = action.label();
            match action {
                Action::SendEmailOtp => {
                    verification::send_email_otp(&server, payload.as_ref()).await
                }
                Action::VerifyEmailOtp => verification::verify_email_otp(&server, payload.as_ref()),
                Action::Submit => submission::submit(&server, payload).await,
            }
        }
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            let status = err.status_code();
            if status.is_server_error() {
                tracing::error!(
                    action = label,
                    status = status.as_u16(),
                    kind = err.kind(),
                    error = %err,
                    "CRM request failed"
                );
            } else {
                tracing::debug!(action = label, error = %err, "CRM request rejected");
            }
            err.to_response(server.expose_error_detail())
        }
    };

    record_request(label, response.status(), started.elapsed());
    response
}

#[derive(Serialize)]
struct Preflight {
    success: bool,
    preflight: bool,
}

async fn preflight() -> Json<Preflight> {
    Json(Preflight {
        success: true,
        preflight: true,
    })
}

async fn apply_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, x-flow-key"),
    );
    response
}

/// An empty body is no payload at all, not a parse error.
fn parse_body(body: &[u8]) -> Result<Option<Value>, RelayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|_| RelayError::validation(INVALID_JSON))
}

/// Read `key` from an object as text.
pub(crate) fn text_field(payload: Option<&Value>, key: &str) -> String {
    text_value(payload.and_then(|p| p.get(key)))
}

/// Strings pass through, numbers are rendered, anything else reads as empty.
pub(crate) fn text_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn success<T: Serialize>(body: T) -> Response {
    Json(body).into_response()
}
