//! Relay configuration, read once from the environment at startup.
//!
//! ```bash
//! # OTP signing (required before any OTP or proof work happens)
//! EMAIL_OTP_SECRET=...
//! EMAIL_OTP_TTL_SECONDS=600
//! EMAIL_VERIFY_PROOF_TTL_SECONDS=1800
//!
//! # Downstream workflow that receives submissions
//! FLOW_ENDPOINT_URL=https://flows.example.com/crm
//! FLOW_SHARED_KEY=...
//!
//! # Flow that emails the code (falls back to FLOW_OTP_ENDPOINT_URL / FLOW_SHARED_KEY)
//! OTP_FLOW_ENDPOINT_URL=https://flows.example.com/otp
//! OTP_FLOW_SHARED_KEY=...
//!
//! REQUIRE_EMAIL_VERIFICATION=true   # anything but "false" keeps it on
//! CRM_RELAY_ENV=production          # "development" exposes dispatch error detail
//! CRM_RELAY_SOURCE=digitalaigarage-website
//! CRM_RELAY_HTTP_TIMEOUT_SECS=15
//! ```
//!
//! Missing secrets and endpoints are not startup errors: the relay still
//! serves, and the operations that need them fail with a configuration error.
//! Values that are present but malformed are rejected here.

use crm_relay_otp::{DEFAULT_OTP_TTL_SECS, DEFAULT_PROOF_TTL_SECS};
use reqwest::Url;
use std::env;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

pub const DEFAULT_SOURCE: &str = "digitalaigarage-website";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// A secret string that never shows up in `Debug` output.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[redacted]")
    }
}

/// An HTTP collaborator reached by JSON POST with an optional `x-flow-key`.
#[derive(Debug, Clone)]
pub struct FlowTarget {
    pub url: Url,
    pub shared_key: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeEnvironment {
    Development,
    #[default]
    Production,
}

impl RuntimeEnvironment {
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub otp_secret: Option<SecretString>,
    pub otp_ttl_secs: u64,
    pub proof_ttl_secs: u64,
    /// Receives validated submissions.
    pub workflow: Option<FlowTarget>,
    /// Emails the one-time code.
    pub otp_flow: Option<FlowTarget>,
    pub verification_required: bool,
    pub environment: RuntimeEnvironment,
    /// `source` tag stamped on everything sent downstream.
    pub source: String,
    pub http_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            otp_secret: None,
            otp_ttl_secs: DEFAULT_OTP_TTL_SECS,
            proof_ttl_secs: DEFAULT_PROOF_TTL_SECS,
            workflow: None,
            otp_flow: None,
            verification_required: true,
            environment: RuntimeEnvironment::Production,
            source: DEFAULT_SOURCE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} is not a whole number")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Invalid URL in {var}: {reason}")]
    InvalidUrl { var: &'static str, reason: String },
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let otp_ttl_secs = positive_secs("EMAIL_OTP_TTL_SECONDS", DEFAULT_OTP_TTL_SECS)?;
        let proof_ttl_secs =
            positive_secs("EMAIL_VERIFY_PROOF_TTL_SECONDS", DEFAULT_PROOF_TTL_SECS)?;
        let http_timeout_secs =
            positive_secs("CRM_RELAY_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        let workflow = flow_target(
            "FLOW_ENDPOINT_URL",
            non_empty_var("FLOW_ENDPOINT_URL"),
            non_empty_var("FLOW_SHARED_KEY"),
        )?;

        let otp_url_var = if non_empty_var("OTP_FLOW_ENDPOINT_URL").is_some() {
            "OTP_FLOW_ENDPOINT_URL"
        } else {
            "FLOW_OTP_ENDPOINT_URL"
        };
        let otp_flow = flow_target(
            otp_url_var,
            non_empty_var(otp_url_var),
            non_empty_var("OTP_FLOW_SHARED_KEY").or_else(|| non_empty_var("FLOW_SHARED_KEY")),
        )?;

        let verification_required = non_empty_var("REQUIRE_EMAIL_VERIFICATION")
            .map(|v| !v.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true); // Required by default

        let environment = match non_empty_var("CRM_RELAY_ENV") {
            Some(v) if v.trim().eq_ignore_ascii_case("development") => {
                RuntimeEnvironment::Development
            }
            _ => RuntimeEnvironment::Production,
        };

        Ok(Self {
            otp_secret: non_empty_var("EMAIL_OTP_SECRET").map(SecretString::new),
            otp_ttl_secs,
            proof_ttl_secs,
            workflow,
            otp_flow,
            verification_required,
            environment,
            source: non_empty_var("CRM_RELAY_SOURCE").unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

/// Unset and empty are treated the same.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn positive_secs(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = non_empty_var(var) else {
        return Ok(default);
    };
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            var,
            value: raw.clone(),
        })?;
    if secs == 0 {
        return Err(ConfigError::ZeroDuration(var));
    }
    Ok(secs)
}

fn flow_target(
    var: &'static str,
    url: Option<String>,
    shared_key: Option<String>,
) -> Result<Option<FlowTarget>, ConfigError> {
    let Some(url) = url else {
        return Ok(None);
    };
    let url = Url::parse(url.trim()).map_err(|e| ConfigError::InvalidUrl {
        var,
        reason: e.to_string(),
    })?;
    Ok(Some(FlowTarget {
        url,
        shared_key: shared_key.map(SecretString::new),
    }))
}
