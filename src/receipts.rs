use crate::error::{MailResult, MailboxError, is_unique_violation};
use crate::mailbox::Mailbox;
use crate::models::{NotificationKind, ReadReceipt};
use crate::response::{Ack, ReceiptListResponse, failure_text};
use crate::session::AuthContext;
use chrono::Utc;
use sqlx::Row;

enum Recorded {
    New,
    Already,
}

impl Mailbox {
    /// Record that the caller read a message they received. Idempotent: a
    /// repeat call is a benign success and never produces a second
    /// notification.
    pub async fn record_read_receipt(&self, auth: &AuthContext, email_id: i64) -> Ack {
        match self.try_record_receipt(auth, email_id).await {
            Ok(Recorded::New) => Ack::ok(),
            Ok(Recorded::Already) => Ack::ok_with("Read receipt already recorded"),
            Err(err) => Ack::fail(failure_text(err, "Failed to record read receipt")),
        }
    }

    pub async fn read_receipts(&self, auth: &AuthContext, email_id: i64) -> ReceiptListResponse {
        match self.try_receipts(auth, email_id).await {
            Ok(receipts) => ReceiptListResponse::ok(receipts),
            Err(err) => {
                ReceiptListResponse::fail(failure_text(err, "Failed to fetch read receipts"))
            }
        }
    }

    async fn try_record_receipt(&self, auth: &AuthContext, email_id: i64) -> MailResult<Recorded> {
        let session = auth.require()?;

        let email = sqlx::query(
            "SELECT e.sender_id, e.subject FROM emails e WHERE e.id = ?2 \
             AND EXISTS (SELECT 1 FROM recipients r WHERE r.email_id = e.id AND r.user_id = ?1)",
        )
        .bind(session.user_id)
        .bind(email_id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or(MailboxError::NotFound("Email not found"))?;
        let sender_id: i64 = email.get(0);
        let subject: String = email.get(1);

        let existing = sqlx::query("SELECT 1 FROM read_receipts WHERE email_id = ? AND user_id = ?")
            .bind(email_id)
            .bind(session.user_id)
            .fetch_optional(&self.db.pool)
            .await?;
        if existing.is_some() {
            return Ok(Recorded::Already);
        }

        let now = Utc::now();
        let mut tx = self.db.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO read_receipts (email_id, user_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(email_id)
        .bind(session.user_id)
        .bind(now)
        .execute(&mut *tx)
        .await;
        if let Err(err) = inserted {
            // Lost a race with another recording of the same read.
            if is_unique_violation(&err) {
                return Ok(Recorded::Already);
            }
            return Err(err.into());
        }

        if sender_id != session.user_id {
            sqlx::query(
                "INSERT INTO notifications (user_id, kind, title, message, email_id, is_read, created_at) \
                 VALUES (?, ?, ?, ?, ?, 0, ?)",
            )
            .bind(sender_id)
            .bind(NotificationKind::ReadReceipt.as_str())
            .bind("Email Read")
            .bind(format!("{} has read your email: {}", session.email, subject))
            .bind(email_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Recorded::New)
    }

    async fn try_receipts(&self, auth: &AuthContext, email_id: i64) -> MailResult<Vec<ReadReceipt>> {
        let session = auth.require()?;
        if !self.db.email_visible(session.user_id, email_id).await? {
            return Err(MailboxError::NotFound("Email not found"));
        }
        self.db.receipts_for(email_id).await
    }
}
