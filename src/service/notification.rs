//! Notification service

use std::sync::Arc;

use crate::data::{Database, NotificationWithSender};
use crate::error::AppError;

/// Notification service
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    /// Create new notification service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Notifications for `recipient_id`, newest first
    ///
    /// Every notification of the recipient is marked read afterwards; the
    /// returned list still shows the flags as they were before.
    pub async fn list(&self, recipient_id: &str) -> Result<Vec<NotificationWithSender>, AppError> {
        let notifications = self.db.get_notifications_for(recipient_id).await?;
        let marked = self.db.mark_all_notifications_read(recipient_id).await?;
        tracing::debug!(recipient = %recipient_id, marked, "Notifications marked read");

        Ok(notifications)
    }

    /// Delete every notification of `recipient_id`
    pub async fn delete_all(&self, recipient_id: &str) -> Result<u64, AppError> {
        let deleted = self.db.delete_notifications_for(recipient_id).await?;
        tracing::info!(recipient = %recipient_id, deleted, "Notifications deleted");
        Ok(deleted)
    }

    /// Delete one notification addressed to `recipient_id`
    ///
    /// # Errors
    /// - `NotFound` if no such notification exists
    /// - `Unauthorized` if it is addressed to someone else
    pub async fn delete_one(&self, recipient_id: &str, id: &str) -> Result<(), AppError> {
        let notification = self
            .db
            .get_notification(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.to_user_id != recipient_id {
            return Err(AppError::Unauthorized);
        }

        self.db.delete_notification(id).await?;
        Ok(())
    }
}
