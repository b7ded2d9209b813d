//! User repository trait.

use crate::error::LedgerResult;
use crate::models::{NewUser, UserRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for user accounts and profile fields.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a new user.
    ///
    /// Fails with `AlreadyExists` when the username or the external
    /// subject id is already taken.
    async fn create_user(&self, user: &NewUser) -> LedgerResult<UserRow>;

    /// Get a user by internal id.
    async fn get_user(&self, user_id: Uuid) -> LedgerResult<Option<UserRow>>;

    /// Get a user by external identity subject.
    async fn get_user_by_external_id(&self, external_id: &str) -> LedgerResult<Option<UserRow>>;

    /// Check whether a username is taken.
    async fn username_exists(&self, username: &str) -> LedgerResult<bool>;

    /// Update a user's profile fields. Returns the updated row.
    async fn update_profile(
        &self,
        user_id: Uuid,
        fullname: &str,
        bio: &str,
    ) -> LedgerResult<UserRow>;
}
