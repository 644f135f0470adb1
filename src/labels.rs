use crate::error::{MailResult, MailboxError, is_unique_violation};
use crate::mailbox::Mailbox;
use crate::models::{Label, LabelWithCount};
use crate::response::{Ack, LabelListResponse, LabelResponse, failure_text};
use crate::session::AuthContext;
use crate::views::View;
use chrono::Utc;
use sqlx::Row;

const DEFAULT_COLOR: &str = "#6B7280";

fn validate_name(name: &str) -> MailResult<()> {
    if name.is_empty() {
        return Err(MailboxError::Validation("Label name is required".into()));
    }
    if name.chars().count() > 50 {
        return Err(MailboxError::Validation(
            "Label name must be 50 characters or fewer".into(),
        ));
    }
    Ok(())
}

impl Mailbox {
    /// Label names form one shared namespace. Creating a name someone else
    /// already owns reuses their label row and only adds the caller's
    /// association; holding it already is a conflict.
    pub async fn create_label(
        &self,
        auth: &AuthContext,
        name: &str,
        color: Option<&str>,
    ) -> LabelResponse {
        match self.try_create_label(auth, name, color).await {
            Ok(label) => {
                self.invalidate(&[View::Inbox]);
                LabelResponse::ok(label)
            }
            Err(err) => LabelResponse::fail(failure_text(err, "Failed to create label")),
        }
    }

    pub async fn user_labels(&self, auth: &AuthContext) -> LabelListResponse {
        match self.try_user_labels(auth).await {
            Ok(labels) => LabelListResponse::ok(labels),
            Err(err) => LabelListResponse::fail(failure_text(err, "Failed to fetch labels")),
        }
    }

    pub async fn update_label(
        &self,
        auth: &AuthContext,
        label_id: i64,
        name: Option<&str>,
        color: Option<&str>,
    ) -> LabelResponse {
        match self.try_update_label(auth, label_id, name, color).await {
            Ok(label) => {
                self.invalidate(&[View::Inbox]);
                LabelResponse::ok(label)
            }
            Err(err) => LabelResponse::fail(failure_text(err, "Failed to update label")),
        }
    }

    /// Drops the caller's association; the shared label row itself only goes
    /// away with its last holder.
    pub async fn delete_label(&self, auth: &AuthContext, label_id: i64) -> Ack {
        match self.try_delete_label(auth, label_id).await {
            Ok(()) => {
                self.invalidate(&[View::Inbox]);
                Ack::ok()
            }
            Err(err) => Ack::fail(failure_text(err, "Failed to delete label")),
        }
    }

    pub async fn add_label_to_email(
        &self,
        auth: &AuthContext,
        email_id: i64,
        label_id: i64,
    ) -> Ack {
        match self.try_add_label(auth, email_id, label_id).await {
            Ok(()) => {
                self.invalidate(&[View::Inbox]);
                Ack::ok()
            }
            Err(err) => Ack::fail(failure_text(err, "Failed to add label")),
        }
    }

    pub async fn remove_label_from_email(
        &self,
        auth: &AuthContext,
        email_id: i64,
        label_id: i64,
    ) -> Ack {
        match self.try_remove_label(auth, email_id, label_id).await {
            Ok(()) => {
                self.invalidate(&[View::Inbox]);
                Ack::ok()
            }
            Err(err) => Ack::fail(failure_text(err, "Failed to remove label")),
        }
    }

    async fn try_create_label(
        &self,
        auth: &AuthContext,
        name: &str,
        color: Option<&str>,
    ) -> MailResult<Label> {
        let session = auth.require()?;
        validate_name(name)?;

        let now = Utc::now();
        let mut tx = self.db.pool.begin().await?;

        let existing = sqlx::query_as::<_, Label>(
            "SELECT id, name, color, created_at, updated_at FROM labels WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        let label = match existing {
            Some(label) => {
                let held = sqlx::query("SELECT 1 FROM user_labels WHERE user_id = ? AND label_id = ?")
                    .bind(session.user_id)
                    .bind(label.id)
                    .fetch_optional(&mut *tx)
                    .await?;
                if held.is_some() {
                    return Err(MailboxError::Conflict("Label already exists"));
                }
                insert_association(&mut tx, session.user_id, label.id).await?;
                label
            }
            None => {
                let color = color.unwrap_or(DEFAULT_COLOR);
                let result = sqlx::query(
                    "INSERT INTO labels (name, color, created_at, updated_at) VALUES (?, ?, ?, ?)",
                )
                .bind(name)
                .bind(color)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                let label_id = result.last_insert_rowid();
                insert_association(&mut tx, session.user_id, label_id).await?;
                Label {
                    id: label_id,
                    name: name.to_string(),
                    color: Some(color.to_string()),
                    created_at: now,
                    updated_at: now,
                }
            }
        };

        tx.commit().await?;
        Ok(label)
    }

    async fn try_user_labels(&self, auth: &AuthContext) -> MailResult<Vec<LabelWithCount>> {
        let session = auth.require()?;
        let rows = sqlx::query(
            "SELECT l.id, l.name, l.color, l.created_at, l.updated_at, \
             (SELECT COUNT(*) FROM email_labels el JOIN emails e ON e.id = el.email_id \
              WHERE el.label_id = l.id AND e.is_trashed = 0 \
              AND (e.sender_id = ?1 OR EXISTS \
                   (SELECT 1 FROM recipients r WHERE r.email_id = e.id AND r.user_id = ?1))) \
             FROM labels l JOIN user_labels ul ON ul.label_id = l.id \
             WHERE ul.user_id = ?1 ORDER BY l.name",
        )
        .bind(session.user_id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LabelWithCount {
                id: row.get(0),
                name: row.get(1),
                color: row.get(2),
                created_at: row.get(3),
                updated_at: row.get(4),
                count: row.get(5),
            })
            .collect())
    }

    async fn try_update_label(
        &self,
        auth: &AuthContext,
        label_id: i64,
        name: Option<&str>,
        color: Option<&str>,
    ) -> MailResult<Label> {
        let session = auth.require()?;
        let held = sqlx::query("SELECT 1 FROM user_labels WHERE user_id = ? AND label_id = ?")
            .bind(session.user_id)
            .bind(label_id)
            .fetch_optional(&self.db.pool)
            .await?;
        if held.is_none() {
            return Err(MailboxError::NotFound("Label not found"));
        }

        sqlx::query(
            "UPDATE labels SET name = coalesce(?, name), color = coalesce(?, color), \
             updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(color)
        .bind(Utc::now())
        .bind(label_id)
        .execute(&self.db.pool)
        .await?;

        let label = sqlx::query_as::<_, Label>(
            "SELECT id, name, color, created_at, updated_at FROM labels WHERE id = ?",
        )
        .bind(label_id)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(label)
    }

    async fn try_delete_label(&self, auth: &AuthContext, label_id: i64) -> MailResult<()> {
        let session = auth.require()?;
        let mut tx = self.db.pool.begin().await?;

        sqlx::query("DELETE FROM user_labels WHERE user_id = ? AND label_id = ?")
            .bind(session.user_id)
            .bind(label_id)
            .execute(&mut *tx)
            .await?;

        let holders: i64 =
            sqlx::query("SELECT COUNT(*) FROM user_labels WHERE label_id = ?")
                .bind(label_id)
                .fetch_one(&mut *tx)
                .await?
                .get(0);
        if holders == 0 {
            sqlx::query("DELETE FROM labels WHERE id = ?")
                .bind(label_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn try_add_label(
        &self,
        auth: &AuthContext,
        email_id: i64,
        label_id: i64,
    ) -> MailResult<()> {
        let session = auth.require()?;
        if !self.db.email_visible(session.user_id, email_id).await? {
            return Err(MailboxError::NotFound("Email not found"));
        }

        let applied = sqlx::query("SELECT 1 FROM email_labels WHERE email_id = ? AND label_id = ?")
            .bind(email_id)
            .bind(label_id)
            .fetch_optional(&self.db.pool)
            .await?;
        if applied.is_some() {
            return Err(MailboxError::Conflict("Label already applied"));
        }

        sqlx::query("INSERT INTO email_labels (email_id, label_id) VALUES (?, ?)")
            .bind(email_id)
            .bind(label_id)
            .execute(&self.db.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    MailboxError::Conflict("Label already applied")
                } else {
                    err.into()
                }
            })?;
        Ok(())
    }

    async fn try_remove_label(
        &self,
        auth: &AuthContext,
        email_id: i64,
        label_id: i64,
    ) -> MailResult<()> {
        let session = auth.require()?;
        if !self.db.email_visible(session.user_id, email_id).await? {
            return Err(MailboxError::NotFound("Email not found"));
        }

        let result = sqlx::query("DELETE FROM email_labels WHERE email_id = ? AND label_id = ?")
            .bind(email_id)
            .bind(label_id)
            .execute(&self.db.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MailboxError::NotFound("Label not found"));
        }
        Ok(())
    }
}

/// The unique (user, label) constraint is the arbiter under concurrent
/// association attempts.
async fn insert_association(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    user_id: i64,
    label_id: i64,
) -> MailResult<()> {
    sqlx::query("INSERT INTO user_labels (user_id, label_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(label_id)
        .execute(&mut **tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                MailboxError::Conflict("Label already exists")
            } else {
                err.into()
            }
        })?;
    Ok(())
}
