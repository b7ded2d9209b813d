//! Notification repository trait.

use crate::error::LedgerResult;
use crate::models::{NewNotification, NotificationFeedRow, NotificationRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for notification records.
#[async_trait]
pub trait NotificationRepo: Send + Sync {
    /// Insert a notification record.
    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> LedgerResult<NotificationRow>;

    /// A receiver's notifications newest-first, enriched with sender
    /// display fields and the related post where present.
    async fn get_notifications(&self, receiver_id: Uuid) -> LedgerResult<Vec<NotificationFeedRow>>;

    /// Delete a notification scoped to its receiver.
    ///
    /// Fails with `NotFound` when absent or owned by another receiver.
    async fn delete_notification(&self, notification_id: Uuid, receiver_id: Uuid)
    -> LedgerResult<()>;
}
