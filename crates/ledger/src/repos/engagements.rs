//! Engagement repository trait: follow, like, and bookmark toggles.

use crate::error::LedgerResult;
use crate::models::FeedPostRow;
use async_trait::async_trait;
use pinboard_core::ToggleOutcome;
use uuid::Uuid;

/// Repository for engagement edges and their counter projections.
///
/// Each toggle runs as one transaction. The unique constraint on the
/// edge table arbitrates concurrent creations: a duplicate insert is a
/// benign no-op, never an error.
#[async_trait]
pub trait EngagementRepo: Send + Sync {
    /// Toggle a follow edge.
    ///
    /// Mutates the follower's `following` counter and the target's
    /// `followers` counter. Fails with `SelfFollow` when both ids match
    /// and `NotFound` when the target user does not exist.
    async fn toggle_follow(
        &self,
        follower_id: Uuid,
        following_id: Uuid,
    ) -> LedgerResult<ToggleOutcome>;

    /// Toggle a like edge, mutating the post's `likes` counter.
    ///
    /// Fails with `NotFound` when the post does not exist.
    async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> LedgerResult<ToggleOutcome>;

    /// Toggle a bookmark edge. Bookmarks have no counter projection.
    ///
    /// Fails with `NotFound` when the post does not exist.
    async fn toggle_bookmark(&self, user_id: Uuid, post_id: Uuid) -> LedgerResult<ToggleOutcome>;

    /// Check whether a follow edge exists.
    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> LedgerResult<bool>;

    /// The user's bookmarked posts, most recently bookmarked first.
    async fn get_bookmarked_posts(&self, user_id: Uuid) -> LedgerResult<Vec<FeedPostRow>>;
}
