use crate::db::{self, VISIBLE_UNALIASED};
use crate::error::{MailResult, MailboxError};
use crate::mailbox::Mailbox;
use crate::models::RecipientKind;
use crate::response::{Ack, SendResponse, StarResponse, failure_text};
use crate::session::AuthContext;
use crate::views::View;
use chrono::Utc;
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use sqlx::Row;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendEmail {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
}

/// First failing field wins, in schema order.
fn validate(input: &SendEmail) -> MailResult<()> {
    if input.to.is_empty() {
        return Err(MailboxError::Validation(
            "At least one recipient is required".into(),
        ));
    }
    for address in input.to.iter().chain(&input.cc).chain(&input.bcc) {
        if address.parse::<EmailAddress>().is_err() {
            return Err(MailboxError::Validation("Invalid email address".into()));
        }
    }
    if input.subject.is_empty() {
        return Err(MailboxError::Validation("Subject is required".into()));
    }
    if input.body.is_empty() {
        return Err(MailboxError::Validation("Body is required".into()));
    }
    Ok(())
}

impl Mailbox {
    /// Write the message and its delivery rows in one transaction. "Send"
    /// only creates local records; no transport is involved.
    pub async fn send_email(&self, auth: &AuthContext, input: SendEmail) -> SendResponse {
        match self.try_send(auth, input).await {
            Ok(email_id) => {
                self.invalidate(&[View::Inbox, View::Sent, View::Drafts]);
                SendResponse::ok(email_id)
            }
            Err(err) => SendResponse::fail(failure_text(err, "Failed to send email")),
        }
    }

    pub async fn toggle_star(&self, auth: &AuthContext, email_id: i64) -> StarResponse {
        match self.try_toggle_star(auth, email_id).await {
            Ok(is_starred) => {
                self.invalidate(&[View::Inbox, View::Starred, View::Sent]);
                StarResponse::ok(is_starred)
            }
            Err(err) => StarResponse::fail(failure_text(err, "Failed to toggle star")),
        }
    }

    /// Flips read state on the caller's own delivery rows. Zero matching
    /// rows is a no-op success, not an error.
    pub async fn mark_as_read(&self, auth: &AuthContext, email_id: i64) -> Ack {
        match self.try_set_read(auth, email_id, true).await {
            Ok(()) => {
                self.invalidate(&[View::Inbox]);
                Ack::ok()
            }
            Err(err) => Ack::fail(failure_text(err, "Failed to mark as read")),
        }
    }

    pub async fn mark_as_unread(&self, auth: &AuthContext, email_id: i64) -> Ack {
        match self.try_set_read(auth, email_id, false).await {
            Ok(()) => {
                self.invalidate(&[View::Inbox]);
                Ack::ok()
            }
            Err(err) => Ack::fail(failure_text(err, "Failed to mark as unread")),
        }
    }

    pub async fn move_to_trash(&self, auth: &AuthContext, email_id: i64) -> Ack {
        match self.try_set_flag(auth, email_id, "is_trashed").await {
            Ok(()) => {
                self.invalidate(&[View::Inbox, View::Trash]);
                Ack::ok()
            }
            Err(err) => Ack::fail(failure_text(err, "Failed to move to trash")),
        }
    }

    pub async fn archive_email(&self, auth: &AuthContext, email_id: i64) -> Ack {
        match self.try_set_flag(auth, email_id, "is_archived").await {
            Ok(()) => {
                self.invalidate(&[View::Inbox, View::Archive]);
                Ack::ok()
            }
            Err(err) => Ack::fail(failure_text(err, "Failed to archive email")),
        }
    }

    /// Removes the message row; attachments, deliveries, label links and
    /// receipts go with it.
    pub async fn delete_email_permanently(&self, auth: &AuthContext, email_id: i64) -> Ack {
        match self.try_delete(auth, email_id).await {
            Ok(()) => {
                self.invalidate(&[View::Trash]);
                Ack::ok()
            }
            Err(err) => Ack::fail(failure_text(err, "Failed to delete email")),
        }
    }

    async fn try_send(&self, auth: &AuthContext, input: SendEmail) -> MailResult<i64> {
        let session = auth.require()?;
        validate(&input)?;

        let now = Utc::now();
        let mut tx = self.db.pool.begin().await?;

        // One delivery slot per user; when an address shows up under
        // several roles the first of TO, CC, BCC wins.
        let mut deliveries: Vec<(i64, RecipientKind)> = Vec::new();
        for (kind, list) in [
            (RecipientKind::To, &input.to),
            (RecipientKind::Cc, &input.cc),
            (RecipientKind::Bcc, &input.bcc),
        ] {
            for address in list {
                let user = db::find_or_create_user(&mut tx, address, None, now).await?;
                if deliveries.iter().any(|(user_id, _)| *user_id == user.id) {
                    continue;
                }
                deliveries.push((user.id, kind));
            }
        }

        let sent_at = if input.is_draft { None } else { Some(now) };
        let result = sqlx::query(
            "INSERT INTO emails (subject, body, body_html, sender_id, is_draft, sent_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.subject)
        .bind(&input.body)
        .bind(&input.body_html)
        .bind(session.user_id)
        .bind(input.is_draft)
        .bind(sent_at)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let email_id = result.last_insert_rowid();

        for (user_id, kind) in &deliveries {
            sqlx::query(
                "INSERT INTO recipients (email_id, user_id, kind, is_read, created_at) \
                 VALUES (?, ?, ?, 0, ?)",
            )
            .bind(email_id)
            .bind(*user_id)
            .bind(kind.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(email_id)
    }

    async fn try_toggle_star(&self, auth: &AuthContext, email_id: i64) -> MailResult<bool> {
        let session = auth.require()?;
        let sql = format!(
            "UPDATE emails SET is_starred = NOT is_starred, updated_at = ?2 \
             WHERE id = ?3 AND {VISIBLE_UNALIASED} RETURNING is_starred"
        );
        let row = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(Utc::now())
            .bind(email_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(MailboxError::NotFound("Email not found"))?;
        Ok(row.get(0))
    }

    async fn try_set_read(&self, auth: &AuthContext, email_id: i64, read: bool) -> MailResult<()> {
        let session = auth.require()?;
        let read_at = if read { Some(Utc::now()) } else { None };
        sqlx::query("UPDATE recipients SET is_read = ?, read_at = ? WHERE email_id = ? AND user_id = ?")
            .bind(read)
            .bind(read_at)
            .bind(email_id)
            .bind(session.user_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    async fn try_set_flag(&self, auth: &AuthContext, email_id: i64, flag: &str) -> MailResult<()> {
        let session = auth.require()?;
        let sql = format!(
            "UPDATE emails SET {flag} = 1, updated_at = ?2 WHERE id = ?3 AND {VISIBLE_UNALIASED}"
        );
        let result = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(Utc::now())
            .bind(email_id)
            .execute(&self.db.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MailboxError::NotFound("Email not found"));
        }
        Ok(())
    }

    async fn try_delete(&self, auth: &AuthContext, email_id: i64) -> MailResult<()> {
        let session = auth.require()?;
        let sql = format!("DELETE FROM emails WHERE id = ?2 AND {VISIBLE_UNALIASED}");
        let result = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(email_id)
            .execute(&self.db.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MailboxError::NotFound("Email not found"));
        }
        Ok(())
    }
}
