//! Flow-backed code dispatcher.

use super::{DispatchError, OtpDispatcher};
use crate::flow::FlowEndpoint;
use async_trait::async_trait;
use serde::Serialize;

const SEND_OTP_ACTION: &str = "send-email-otp";

pub struct FlowOtpDispatcher {
    endpoint: FlowEndpoint,
    source: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeRequest<'a> {
    action: &'static str,
    source: &'a str,
    email: &'a str,
    code: &'a str,
    expires_in_sec: u64,
}

impl FlowOtpDispatcher {
    pub fn new(endpoint: FlowEndpoint, source: String) -> Self {
        Self { endpoint, source }
    }
}

#[async_trait]
impl OtpDispatcher for FlowOtpDispatcher {
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        expires_in_sec: u64,
    ) -> Result<(), DispatchError> {
        let request = SendCodeRequest {
            action: SEND_OTP_ACTION,
            source: &self.source,
            email,
            code,
            expires_in_sec,
        };

        self.endpoint.post_json(&request).await?;

        tracing::debug!(
            email = %crm_relay_otp::mask_email(email),
            url = %self.endpoint.target().url,
            "OTP code handed to flow"
        );
        Ok(())
    }
}
