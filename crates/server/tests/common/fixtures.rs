//! Test fixtures for tokens and requests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pinboard_server::identity::{IdentityVerifier, test_claims};
use serde_json::Value;
use tower::ServiceExt;

/// Mint a bearer token for a test subject.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn auth_token(subject: &str, name: &str, email: &str) -> String {
    let verifier = IdentityVerifier::for_testing();
    verifier.issue_for_testing(&test_claims(subject, name, email))
}

/// Make a JSON request against the router and decode the response.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = auth_token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// A tiny image payload as a base64 data URI.
#[allow(dead_code)]
pub fn test_image_data_uri() -> String {
    // Not a real PNG, but the server never inspects pixel data.
    let payload = BASE64.encode(b"test-image-bytes");
    format!("data:image/png;base64,{payload}")
}
