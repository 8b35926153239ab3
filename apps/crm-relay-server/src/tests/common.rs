//! Common test helpers for relay tests.
//!
//! This module provides shared test infrastructure including:
//! - Relay construction with a fixed signing secret
//! - In-memory OTP dispatchers that record or fail
//! - A real HTTP flow endpoint stub that records what it receives
//! - Request helpers that drive the router without a socket

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use crm_relay_otp::OtpAuthority;
use http_body_util::BodyExt;
use reqwest::Url;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use crate::config::{FlowTarget, RelayConfig, SecretString};
use crate::email::{DispatchError, OtpDispatcher};
use crate::flow::{FlowError, FLOW_KEY_HEADER};
use crate::handlers::{router, CRM_REQUEST_PATH};
use crate::server::RelayServer;

pub const TEST_SECRET: &str = "test-otp-secret";

/// Config with a signing secret and everything else at defaults.
pub fn test_config() -> RelayConfig {
    RelayConfig {
        otp_secret: Some(SecretString::new(TEST_SECRET)),
        ..RelayConfig::default()
    }
}

/// An authority sharing the relay's secret, for minting tokens out of band.
pub fn test_authority() -> OtpAuthority {
    let config = test_config();
    OtpAuthority::new(TEST_SECRET, config.otp_ttl_secs, config.proof_ttl_secs).unwrap()
}

/// A proof for `email`, valid from now.
pub fn fresh_proof(email: &str) -> String {
    test_authority().issue_proof(email, Utc::now()).unwrap().token
}

pub fn relay(config: RelayConfig, dispatcher: Option<Arc<dyn OtpDispatcher>>) -> Router {
    router(RelayServer::new(config, reqwest::Client::new(), dispatcher))
}

/// A relay with a recording dispatcher, and that dispatcher.
pub fn relay_recording(config: RelayConfig) -> (Router, Arc<RecordingDispatcher>) {
    let dispatcher = RecordingDispatcher::new();
    let app = relay(config, Some(dispatcher.clone() as Arc<dyn OtpDispatcher>));
    (app, dispatcher)
}

/// A submission that passes structural validation.
pub fn submission(email: &str, proof_token: Option<&str>) -> Value {
    let mut body = json!({
        "contact": {"name": "N", "company": "C", "email": email},
        "selectedRequirements": ["x"],
    });
    if let Some(token) = proof_token {
        body["emailVerification"] = json!({ "proofToken": token });
    }
    body
}

// ────────────────────────────────────── Requests ──────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

pub async fn send(app: &Router, method: Method, body: impl Into<Body>) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(CRM_REQUEST_PATH)
        .header(CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn post_json(app: &Router, body: Value) -> TestResponse {
    send(app, Method::POST, body.to_string()).await
}

/// Request a code and return the challenge token with the code that was sent.
pub async fn request_code(
    app: &Router,
    dispatcher: &RecordingDispatcher,
    email: &str,
) -> (String, String) {
    let response = post_json(app, json!({"action": "send-email-otp", "email": email})).await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    let token = response.body["verificationToken"]
        .as_str()
        .unwrap()
        .to_string();
    let code = dispatcher.last().unwrap().code;
    (token, code)
}

// ────────────────────────────────────── Dispatchers ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    pub email: String,
    pub code: String,
    pub expires_in_sec: u64,
}

/// Keeps every code instead of mailing it.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentCode>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SentCode> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl OtpDispatcher for RecordingDispatcher {
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        expires_in_sec: u64,
    ) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(SentCode {
            email: email.to_string(),
            code: code.to_string(),
            expires_in_sec,
        });
        Ok(())
    }
}

/// Fails every dispatch the way a refusing mail flow would.
pub struct FailingDispatcher;

#[async_trait]
impl OtpDispatcher for FailingDispatcher {
    async fn send_code(&self, _: &str, _: &str, _: u64) -> Result<(), DispatchError> {
        Err(DispatchError::Flow(FlowError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "mail relay down".to_string(),
        }))
    }
}

// ────────────────────────────────────── Flow stub ──────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub flow_key: Option<String>,
    pub body: Value,
}

type StubState = (Arc<Mutex<Vec<RecordedCall>>>, StatusCode);

/// A flow endpoint on a real socket that answers every POST with `status`.
pub struct FlowStub {
    pub addr: SocketAddr,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl FlowStub {
    pub async fn start(status: StatusCode) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/", post(record_call))
            .with_state((calls.clone(), status));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, calls }
    }

    pub fn target(&self, shared_key: Option<&str>) -> FlowTarget {
        FlowTarget {
            url: Url::parse(&format!("http://{}/", self.addr)).unwrap(),
            shared_key: shared_key.map(SecretString::new),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

async fn record_call(
    State((calls, status)): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    let flow_key = headers
        .get(FLOW_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    calls.lock().unwrap().push(RecordedCall { flow_key, body });
    (status, "Service Unavailable: stub upstream detail")
}

/// A target nothing listens on.
pub fn unreachable_target() -> FlowTarget {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    FlowTarget {
        url: Url::parse(&format!("http://{}/", addr)).unwrap(),
        shared_key: None,
    }
}
