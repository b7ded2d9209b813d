//! Bookmark handlers.
//!
//! Bookmarks are private: they touch no counters and emit no
//! notifications.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::handlers::common::{MAX_JSON_BODY_SIZE, current_user, read_json_body};
use crate::handlers::posts::FeedPostResponse;
use crate::metrics::record_toggle;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use pinboard_core::EngagementKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleBookmarkRequest {
    post_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBookmarkResponse {
    pub bookmarked: bool,
}

/// POST /api/bookmarks/toggle - bookmark or unbookmark a post.
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ToggleBookmarkResponse>> {
    let auth = require_auth(&req)?.clone();
    let user = current_user(&state, &auth).await?;

    let body: ToggleBookmarkRequest = read_json_body(req, MAX_JSON_BODY_SIZE).await?;

    // Missing posts surface as NotFound from the toggle itself.
    let outcome = state.ledger.toggle_bookmark(user.id, body.post_id).await?;
    record_toggle(EngagementKind::Bookmark, &outcome);

    Ok(Json(ToggleBookmarkResponse {
        bookmarked: outcome.engaged,
    }))
}

/// GET /api/bookmarks - the caller's bookmarked posts, newest bookmark
/// first.
pub async fn get_bookmarks(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<FeedPostResponse>>> {
    let auth = require_auth(&req)?;
    let user = current_user(&state, auth).await?;

    let rows = state.ledger.get_bookmarked_posts(user.id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
