//! Route configuration.

use crate::auth::auth_middleware;
use crate::error::ApiError;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::ratelimit::{ip_rate_limit_middleware, user_rate_limit_middleware};
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Users
        .route("/api/users/sync", post(handlers::sync_user))
        .route("/api/users/me", get(handlers::get_me))
        .route("/api/users/profile/{user_id}", get(handlers::get_profile))
        .route("/api/users/profile", put(handlers::update_profile))
        .route(
            "/api/users/is-following/{following_id}",
            get(handlers::is_following),
        )
        .route("/api/users/toggle-follow", post(handlers::toggle_follow))
        // Posts
        .route("/api/posts", post(handlers::create_post))
        .route("/api/posts/feed", get(handlers::get_feed))
        .route("/api/posts/user", get(handlers::get_own_posts))
        .route("/api/posts/user/{user_id}", get(handlers::get_user_posts))
        .route("/api/posts/{post_id}", delete(handlers::delete_post))
        .route("/api/posts/toggle-like", post(handlers::toggle_like))
        // Comments
        .route("/api/comments", post(handlers::create_comment))
        .route("/api/comments/{post_id}", get(handlers::get_comments))
        // Bookmarks
        .route("/api/bookmarks/toggle", post(handlers::toggle_bookmark))
        .route("/api/bookmarks", get(handlers::get_bookmarks))
        // Notifications
        .route("/api/notifications", get(handlers::get_notifications))
        .route(
            "/api/notifications/{notification_id}",
            delete(handlers::delete_notification),
        );

    // Health check is unauthenticated for load balancers/k8s probes.
    let mut router = Router::new()
        .merge(api_routes)
        .route("/health", get(handlers::health_check));

    // SECURITY: when enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    // See crate::metrics module documentation for details.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Unknown routes get the same JSON error envelope as handlers.
    router = router.fallback(|| async { ApiError::NotFound("route not found".to_string()) });

    let rate_limit_state = state.rate_limit.clone();

    // Middleware layers are applied in reverse order (outermost first).
    // Order of execution: TraceLayer -> IP rate limit -> Auth -> user rate limit -> Handler
    router
        .layer(middleware::from_fn_with_state(
            rate_limit_state.clone(),
            user_rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            rate_limit_state,
            ip_rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
