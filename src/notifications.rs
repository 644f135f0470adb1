use crate::error::{MailResult, MailboxError};
use crate::mailbox::Mailbox;
use crate::models::{Notification, NotificationKind};
use crate::response::{Ack, NotificationListResponse, failure_text};
use crate::session::AuthContext;
use sqlx::Row;

impl Mailbox {
    pub async fn notifications(&self, auth: &AuthContext) -> NotificationListResponse {
        match self.try_notifications(auth).await {
            Ok(notifications) => NotificationListResponse::ok(notifications),
            Err(err) => {
                NotificationListResponse::fail(failure_text(err, "Failed to fetch notifications"))
            }
        }
    }

    pub async fn mark_notification_read(&self, auth: &AuthContext, notification_id: i64) -> Ack {
        match self.try_mark_read(auth, notification_id).await {
            Ok(()) => Ack::ok(),
            Err(err) => Ack::fail(failure_text(err, "Failed to mark notification as read")),
        }
    }

    pub async fn mark_all_notifications_read(&self, auth: &AuthContext) -> Ack {
        match self.try_mark_all_read(auth).await {
            Ok(()) => Ack::ok(),
            Err(err) => Ack::fail(failure_text(err, "Failed to mark notifications as read")),
        }
    }

    pub async fn delete_notification(&self, auth: &AuthContext, notification_id: i64) -> Ack {
        match self.try_delete_notification(auth, notification_id).await {
            Ok(()) => Ack::ok(),
            Err(err) => Ack::fail(failure_text(err, "Failed to delete notification")),
        }
    }

    async fn try_notifications(&self, auth: &AuthContext) -> MailResult<Vec<Notification>> {
        let session = auth.require()?;
        let rows = sqlx::query(
            "SELECT id, user_id, kind, title, message, email_id, is_read, created_at \
             FROM notifications WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(session.user_id)
        .bind(self.config.page_size)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Notification {
                id: row.get(0),
                user_id: row.get(1),
                kind: NotificationKind::parse(&row.get::<String, _>(2)),
                title: row.get(3),
                message: row.get(4),
                email_id: row.get(5),
                is_read: row.get(6),
                created_at: row.get(7),
            })
            .collect())
    }

    async fn try_mark_read(&self, auth: &AuthContext, notification_id: i64) -> MailResult<()> {
        let session = auth.require()?;
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
                .bind(notification_id)
                .bind(session.user_id)
                .execute(&self.db.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(MailboxError::NotFound("Notification not found"));
        }
        Ok(())
    }

    async fn try_mark_all_read(&self, auth: &AuthContext) -> MailResult<()> {
        let session = auth.require()?;
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
            .bind(session.user_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    async fn try_delete_notification(
        &self,
        auth: &AuthContext,
        notification_id: i64,
    ) -> MailResult<()> {
        let session = auth.require()?;
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(notification_id)
            .bind(session.user_id)
            .execute(&self.db.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MailboxError::NotFound("Notification not found"));
        }
        Ok(())
    }
}
