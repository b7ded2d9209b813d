//! Integration tests for HTTP API endpoints.

mod common;

use axum::http::StatusCode;
use common::TestServer;
use common::fixtures::{auth_token, json_request, test_image_data_uri};
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let (status, body) = json_request(&server.router, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
    assert!(body.get("version").is_some());
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let server = TestServer::new().await;

    let (status, body) = json_request(&server.router, "GET", "/api/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.get("code").and_then(|v| v.as_str()), Some("not_found"));
}

#[tokio::test]
async fn test_requires_auth() {
    let server = TestServer::new().await;

    let (status, body) = json_request(&server.router, "GET", "/api/users/me", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body.get("code").and_then(|v| v.as_str()),
        Some("unauthorized")
    );
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let server = TestServer::new().await;

    let (status, _) = json_request(
        &server.router,
        "GET",
        "/api/users/me",
        None,
        Some("not-a-valid-jwt"),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_creates_then_returns_existing() {
    let server = TestServer::new().await;
    let token = auth_token("sub-sync", "Jane Doe", "jane@example.com");

    let (status, created) = json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        None,
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        created.get("fullname").and_then(|v| v.as_str()),
        Some("Jane Doe")
    );
    assert_eq!(
        created.get("email").and_then(|v| v.as_str()),
        Some("jane@example.com")
    );
    assert!(created.get("username").is_some());

    let (status, existing) = json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        None,
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(existing.get("id"), created.get("id"));
    assert_eq!(existing.get("username"), created.get("username"));
}

#[tokio::test]
async fn test_sync_body_overrides_claims() {
    let server = TestServer::new().await;
    let token = auth_token("sub-override", "Claim Name", "claim@example.com");

    let body = json!({
        "fullname": "Body Name",
        "username": "picked_name"
    });
    let (status, user) = json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        Some(body),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        user.get("fullname").and_then(|v| v.as_str()),
        Some("Body Name")
    );
    assert_eq!(
        user.get("username").and_then(|v| v.as_str()),
        Some("picked_name")
    );
}

#[tokio::test]
async fn test_username_collision_gets_suffix() {
    let server = TestServer::new().await;

    let token_a = auth_token("sub-col-a", "Collide", "collide@example.com");
    let (status, user_a) = json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        Some(json!({"username": "collide"})),
        Some(&token_a),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        user_a.get("username").and_then(|v| v.as_str()),
        Some("collide")
    );

    let token_b = auth_token("sub-col-b", "Collide Too", "collide2@example.com");
    let (status, user_b) = json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        Some(json!({"username": "collide"})),
        Some(&token_b),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let name_b = user_b.get("username").and_then(|v| v.as_str()).unwrap();
    assert_ne!(name_b, "collide");
    assert!(name_b.starts_with("collide"));
}

#[tokio::test]
async fn test_username_fallback_after_exhausted_candidates() {
    let server = TestServer::new().await;

    // Consume the base name and every numbered candidate.
    for i in 0..100 {
        let token = auth_token(
            &format!("sub-fb-{i}"),
            "Crowded",
            &format!("crowded{i}@example.com"),
        );
        let (status, _) = json_request(
            &server.router,
            "POST",
            "/api/users/sync",
            Some(json!({"username": "crowded"})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let token = auth_token("sub-fb-last", "Crowded Out", "crowded-out@example.com");
    let (status, user) = json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        Some(json!({"username": "crowded"})),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let name = user.get("username").and_then(|v| v.as_str()).unwrap();
    assert!(name.starts_with("user_sub_fb_l_"), "got {name}");

    // Still idempotent on the fallback name.
    let (status, again) = json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        Some(json!({"username": "crowded"})),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again.get("username"), user.get("username"));
}

#[tokio::test]
async fn test_me_requires_sync_first() {
    let server = TestServer::new().await;
    let token = auth_token("sub-unsynced", "Ghost", "ghost@example.com");

    let (status, _) =
        json_request(&server.router, "GET", "/api/users/me", None, Some(&token)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_profile_validation() {
    let server = TestServer::new().await;
    let token = auth_token("sub-profile", "Jane", "jane@example.com");
    json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        None,
        Some(&token),
    )
    .await;

    let (status, _) = json_request(
        &server.router,
        "PUT",
        "/api/users/profile",
        Some(json!({"fullname": "   "})),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = json_request(
        &server.router,
        "PUT",
        "/api/users/profile",
        Some(json!({"fullname": "New Name", "bio": "hello"})),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        updated.get("fullname").and_then(|v| v.as_str()),
        Some("New Name")
    );
    assert_eq!(updated.get("bio").and_then(|v| v.as_str()), Some("hello"));
}

#[tokio::test]
async fn test_create_post_requires_caption_or_image() {
    let server = TestServer::new().await;
    let token = auth_token("sub-post-empty", "Jane", "jane@example.com");
    json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        None,
        Some(&token),
    )
    .await;

    let (status, _) = json_request(
        &server.router,
        "POST",
        "/api/posts",
        Some(json!({})),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_post_rejects_non_data_uri_image() {
    let server = TestServer::new().await;
    let token = auth_token("sub-post-bad", "Jane", "jane@example.com");
    json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        None,
        Some(&token),
    )
    .await;

    let (status, _) = json_request(
        &server.router,
        "POST",
        "/api/posts",
        Some(json!({"image": "https://example.com/a.png"})),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_post_with_image() {
    let server = TestServer::new().await;
    let token = auth_token("sub-post-img", "Jane", "jane@example.com");
    json_request(
        &server.router,
        "POST",
        "/api/users/sync",
        None,
        Some(&token),
    )
    .await;

    let (status, post) = json_request(
        &server.router,
        "POST",
        "/api/posts",
        Some(json!({"caption": "first", "image": test_image_data_uri()})),
        Some(&token),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post.get("caption").and_then(|v| v.as_str()), Some("first"));
    let image_url = post.get("imageUrl").and_then(|v| v.as_str()).unwrap();
    assert!(image_url.starts_with("http://localhost:8080/media/"));
}

#[tokio::test]
async fn test_metrics_endpoint_enabled_by_default() {
    let server = TestServer::new().await;

    let (status, _) = json_request(&server.router, "GET", "/metrics", None, None).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_disabled() {
    let server = TestServer::with_config(|config| {
        config.server.metrics_enabled = false;
    })
    .await;

    let (status, _) = json_request(&server.router, "GET", "/metrics", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
