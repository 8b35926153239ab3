use crm_relay_otp::OtpAuthority;
use reqwest::Client;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::email::{create_dispatcher, OtpDispatcher};
use crate::error::{RelayError, OTP_NOT_CONFIGURED};
use crate::flow::{build_client, FlowEndpoint};

/// Shared, read-only state behind every relay request.
#[derive(Clone)]
pub struct RelayServer {
    pub config: Arc<RelayConfig>,
    otp: Option<Arc<OtpAuthority>>,
    otp_dispatcher: Option<Arc<dyn OtpDispatcher>>,
    workflow: Option<FlowEndpoint>,
}

impl RelayServer {
    /// Wire up the relay from configuration, building one shared HTTP client.
    pub fn from_config(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(config.http_timeout)?;
        let dispatcher = create_dispatcher(&config, &client);
        Ok(Self::new(config, client, dispatcher))
    }

    pub fn new(
        config: RelayConfig,
        client: Client,
        otp_dispatcher: Option<Arc<dyn OtpDispatcher>>,
    ) -> Self {
        // A blank secret was already filtered out by config, so this only
        // fails for a secret that cannot key HMAC at all.
        let otp = config.otp_secret.as_ref().and_then(|secret| {
            OtpAuthority::new(
                secret.expose().as_bytes(),
                config.otp_ttl_secs,
                config.proof_ttl_secs,
            )
            .map(Arc::new)
            .map_err(|e| tracing::error!(error = %e, "OTP signing key rejected"))
            .ok()
        });
        let workflow = config
            .workflow
            .clone()
            .map(|target| FlowEndpoint::new(client, target));

        Self {
            config: Arc::new(config),
            otp,
            otp_dispatcher,
            workflow,
        }
    }

    /// The signing authority, or the configuration error every OTP path reports.
    pub fn otp_authority(&self) -> Result<&OtpAuthority, RelayError> {
        self.otp.as_deref().ok_or_else(|| {
            RelayError::configuration(OTP_NOT_CONFIGURED, "EMAIL_OTP_SECRET is not configured.")
        })
    }

    pub fn otp_dispatcher(&self) -> Option<&dyn OtpDispatcher> {
        self.otp_dispatcher.as_deref()
    }

    pub fn workflow(&self) -> Option<&FlowEndpoint> {
        self.workflow.as_ref()
    }

    pub fn expose_error_detail(&self) -> bool {
        self.config.environment.is_development()
    }
}
