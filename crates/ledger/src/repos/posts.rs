//! Post repository trait.

use crate::error::LedgerResult;
use crate::models::{CascadeSummary, FeedPostRow, NewPost, PostRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for posts, the feed, and cascade deletion.
#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Create a post and increment the owner's `posts` counter in one
    /// transaction.
    async fn create_post(&self, post: &NewPost) -> LedgerResult<PostRow>;

    /// Get a post by id.
    async fn get_post(&self, post_id: Uuid) -> LedgerResult<Option<PostRow>>;

    /// Get a post by id, scoped to its owner.
    ///
    /// Absent and owned-by-another are indistinguishable to callers.
    async fn get_post_owned(&self, post_id: Uuid, owner_id: Uuid)
    -> LedgerResult<Option<PostRow>>;

    /// All posts newest-first, with author fields and per-viewer
    /// engagement flags.
    async fn get_feed(&self, viewer_id: Uuid) -> LedgerResult<Vec<FeedPostRow>>;

    /// A single user's posts newest-first.
    async fn get_user_posts(&self, user_id: Uuid) -> LedgerResult<Vec<PostRow>>;

    /// Delete a post and all dependent rows, then decrement the owner's
    /// `posts` counter, in one transaction. Returns counts of deleted
    /// dependent rows.
    ///
    /// Deletion order: likes, bookmarks, notifications, comments, the
    /// post row, counter decrement.
    async fn delete_post_cascade(
        &self,
        post_id: Uuid,
        owner_id: Uuid,
    ) -> LedgerResult<CascadeSummary>;
}
