//! Preflight and cross-origin header tests.

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderMap, Method, StatusCode};
use serde_json::json;

use crate::config::RelayConfig;
use crate::tests::common::*;

fn assert_cors(headers: &HeaderMap) {
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    let allowed = headers[ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
    assert!(allowed.contains("Content-Type"));
    assert!(allowed.contains("x-flow-key"));
}

#[tokio::test]
async fn test_preflight() {
    // No secret and no endpoints: preflight must not care
    let app = relay(RelayConfig::default(), None);

    let response = send(&app, Method::OPTIONS, Body::empty()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"success": true, "preflight": true}));
    assert_cors(&response.headers);
}

#[tokio::test]
async fn test_preflight_ignores_body() {
    let app = relay(test_config(), None);

    let response = send(&app, Method::OPTIONS, "{not json").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["preflight"], true);
}

#[tokio::test]
async fn test_error_responses_carry_cors_and_json() {
    let app = relay(test_config(), None);

    let response = post_json(&app, json!({"contact": {}})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_cors(&response.headers);
    assert!(response.headers[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
}

#[tokio::test]
async fn test_success_responses_carry_cors() {
    let (app, dispatcher) = relay_recording(test_config());

    let response = post_json(&app, json!({"action": "send-email-otp", "email": "a@b.com"})).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_cors(&response.headers);
    assert_eq!(dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn test_server_errors_carry_cors() {
    let app = relay(test_config(), None);

    let response = post_json(&app, submission("a@b.com", Some(&fresh_proof("a@b.com")))).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response.headers);
}
