//! Comment repository trait.

use crate::error::LedgerResult;
use crate::models::{CommentRow, CommentWithAuthorRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for comments.
#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Create a comment and increment the post's `comments` counter in
    /// one transaction. Fails with `NotFound` when the post does not
    /// exist.
    async fn create_comment(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        content: &str,
    ) -> LedgerResult<CommentRow>;

    /// A post's comments oldest-first, with author display fields.
    async fn get_post_comments(&self, post_id: Uuid) -> LedgerResult<Vec<CommentWithAuthorRow>>;
}
