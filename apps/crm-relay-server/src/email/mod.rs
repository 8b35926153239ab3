//! Delivery of one-time codes to the user's mailbox.
//!
//! The relay never talks SMTP itself. Codes are handed to an external flow
//! endpoint that owns templating and delivery.

mod flow_provider;

pub use flow_provider::FlowOtpDispatcher;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

use crate::config::RelayConfig;
use crate::flow::{FlowEndpoint, FlowError};

/// Code dispatch error
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("OTP_FLOW_ENDPOINT_URL (or FLOW_OTP_ENDPOINT_URL) is not configured.")]
    NotConfigured,

    #[error("OTP {0}")]
    Flow(#[from] FlowError),
}

/// Trait for OTP delivery backends
#[async_trait]
pub trait OtpDispatcher: Send + Sync {
    /// Deliver `code` to `email`. `expires_in_sec` is shown to the user.
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        expires_in_sec: u64,
    ) -> Result<(), DispatchError>;
}

/// Create the dispatcher described by configuration, if any.
pub fn create_dispatcher(config: &RelayConfig, client: &Client) -> Option<Arc<dyn OtpDispatcher>> {
    let target = config.otp_flow.clone()?;
    let endpoint = FlowEndpoint::new(client.clone(), target);
    Some(Arc::new(FlowOtpDispatcher::new(endpoint, config.source.clone())))
}
