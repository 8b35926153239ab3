//! Form submission: validate, check the verification proof, relay downstream.

use axum::response::Response;
use chrono::{SecondsFormat, Utc};
use crm_relay_otp::{mask_email, ProofPresentation};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{success, text_value};
use crate::error::{
    RelayError, DOWNSTREAM_REJECTED, DOWNSTREAM_UNAVAILABLE, WORKFLOW_NOT_CONFIGURED,
};
use crate::flow::FlowError;
use crate::metrics::record_outbound_failure;
use crate::server::RelayServer;

const NOT_AN_OBJECT: &str = "Request body must be a JSON object.";
const MISSING_CONTACT: &str = "Missing contact object.";
const MISSING_REQUIREMENTS: &str = "At least one selected requirement is required.";

const CONTACT_FIELDS: [&str; 3] = ["name", "company", "email"];

#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// `email` read as text, for matching against the proof.
    pub email: String,
    /// Every contact key as received, required ones included.
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailVerification {
    pub proof_token: Option<Value>,
    pub extra: Map<String, Value>,
}

/// A structurally valid submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub contact: Contact,
    pub selected_requirements: Vec<Value>,
    pub email_verification: Option<EmailVerification>,
    /// Top-level keys the relay does not interpret.
    pub extra: Map<String, Value>,
}

impl Submission {
    /// Validate a raw payload. The error names the first problem found.
    pub fn parse(payload: Option<Value>) -> Result<Self, RelayError> {
        let Some(Value::Object(mut fields)) = payload else {
            return Err(RelayError::validation(NOT_AN_OBJECT));
        };

        let contact = match fields.remove("contact") {
            Some(Value::Object(contact)) => Contact::parse(contact)?,
            _ => return Err(RelayError::validation(MISSING_CONTACT)),
        };

        let selected_requirements = match fields.remove("selectedRequirements") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return Err(RelayError::validation(MISSING_REQUIREMENTS)),
        };

        let email_verification = match fields.remove("emailVerification") {
            Some(Value::Object(mut ev)) => Some(EmailVerification {
                proof_token: ev.remove("proofToken"),
                extra: ev,
            }),
            Some(other) => {
                fields.insert("emailVerification".to_string(), other);
                None
            }
            None => None,
        };

        Ok(Self {
            contact,
            selected_requirements,
            email_verification,
            extra: fields,
        })
    }

    pub fn proof_token(&self) -> String {
        text_value(
            self.email_verification
                .as_ref()
                .and_then(|ev| ev.proof_token.as_ref()),
        )
    }

    /// The downstream body: the submission as received, plus the relay's own
    /// `requestId`, `receivedAt` and `source`, which override client keys.
    pub fn into_outbound(self, request_id: Uuid, received_at: String, source: &str) -> Value {
        let mut out = self.extra;

        out.insert("contact".to_string(), Value::Object(self.contact.fields));

        out.insert(
            "selectedRequirements".to_string(),
            Value::Array(self.selected_requirements),
        );

        if let Some(ev) = self.email_verification {
            let mut verification = ev.extra;
            if let Some(token) = ev.proof_token {
                verification.insert("proofToken".to_string(), token);
            }
            out.insert("emailVerification".to_string(), Value::Object(verification));
        }

        out.insert("requestId".to_string(), Value::String(request_id.to_string()));
        out.insert("receivedAt".to_string(), Value::String(received_at));
        out.insert("source".to_string(), Value::String(source.to_string()));
        Value::Object(out)
    }
}

impl Contact {
    fn parse(fields: Map<String, Value>) -> Result<Self, RelayError> {
        for field in CONTACT_FIELDS {
            if is_blank(fields.get(field)) {
                return Err(RelayError::validation(format!("Missing contact.{field}.")));
            }
        }

        Ok(Self {
            email: text_value(fields.get("email")),
            fields,
        })
    }
}

/// Blank as a loosely typed form reads it: absent, null, `false`, zero, an
/// empty list, or text that trims to nothing. Other values count as filled.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Bool(true)) | Some(Value::Object(_)) => false,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Submitted {
    success: bool,
    message: &'static str,
    request_id: Uuid,
}

pub async fn submit(server: &RelayServer, payload: Option<Value>) -> Result<Response, RelayError> {
    let submission = Submission::parse(payload)?;

    if server.config.verification_required {
        let proof_token = submission.proof_token();
        let presentation =
            ProofPresentation::new(&submission.contact.email, Some(proof_token.as_str()))?;
        let otp = server.otp_authority()?;
        otp.check_proof(&presentation, Utc::now())?;
    }

    let workflow = server.workflow().ok_or_else(|| {
        RelayError::configuration(WORKFLOW_NOT_CONFIGURED, "FLOW_ENDPOINT_URL is not configured.")
    })?;

    let request_id = Uuid::new_v4();
    let email_masked = mask_email(&submission.contact.email);
    let received_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let outbound = submission.into_outbound(request_id, received_at, &server.config.source);

    workflow.post_json(&outbound).await.map_err(|e| {
        record_outbound_failure("workflow");
        let message = match e {
            FlowError::Status { .. } => DOWNSTREAM_REJECTED,
            FlowError::Transport(_) => DOWNSTREAM_UNAVAILABLE,
        };
        RelayError::Downstream {
            message,
            detail: e.to_string(),
        }
    })?;

    tracing::info!(%request_id, email = %email_masked, "Submission relayed");

    Ok(success(Submitted {
        success: true,
        message: "Request submitted successfully.",
        request_id,
    }))
}
