use crate::db::{Database, EMAIL_SELECT, RECIPIENT_OF, VISIBLE};
use crate::error::{MailResult, MailboxError};
use crate::mailbox::Mailbox;
use crate::models::Email;
use crate::response::{EmailListResponse, EmailResponse, failure_text};
use crate::session::AuthContext;
use chrono::Utc;

impl Mailbox {
    /// Shared list fetch: filter references the caller as ?1, paging rides
    /// as ?2/?3.
    async fn list_view(
        &self,
        user_id: i64,
        filter: &str,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> MailResult<Vec<Email>> {
        let sql = format!("{EMAIL_SELECT} WHERE {filter} ORDER BY {order} LIMIT ?2 OFFSET ?3");
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db.pool)
            .await?;

        let mut emails: Vec<Email> = rows.iter().map(Database::email_from_row).collect();
        self.db.hydrate(&mut emails).await?;
        Ok(emails)
    }

    pub async fn inbox(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        let filter =
            format!("{RECIPIENT_OF} AND e.is_trashed = 0 AND e.is_spam = 0 AND e.is_archived = 0");
        match self.try_list(auth, &filter, "e.sent_at DESC", page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to fetch emails")),
        }
    }

    pub async fn sent(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        let filter = "e.sender_id = ?1 AND e.is_draft = 0 AND e.is_trashed = 0";
        match self.try_list(auth, filter, "e.sent_at DESC", page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to fetch sent emails")),
        }
    }

    pub async fn drafts(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        let filter = "e.sender_id = ?1 AND e.is_draft = 1 AND e.is_trashed = 0";
        match self.try_list(auth, filter, "e.updated_at DESC", page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to fetch drafts")),
        }
    }

    pub async fn starred(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        let filter = format!("{VISIBLE} AND e.is_starred = 1 AND e.is_trashed = 0");
        match self.try_list(auth, &filter, "e.sent_at DESC", page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => {
                EmailListResponse::fail(failure_text(err, "Failed to fetch starred emails"))
            }
        }
    }

    pub async fn spam(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        let filter = format!("{RECIPIENT_OF} AND e.is_spam = 1 AND e.is_trashed = 0");
        match self.try_list(auth, &filter, "e.sent_at DESC", page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to fetch emails")),
        }
    }

    pub async fn archived(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        // Trash wins over archive: a trashed message leaves this view.
        let filter = format!("{VISIBLE} AND e.is_archived = 1 AND e.is_trashed = 0");
        match self.try_list(auth, &filter, "e.sent_at DESC", page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to fetch emails")),
        }
    }

    pub async fn trashed(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        let filter = format!("{VISIBLE} AND e.is_trashed = 1");
        match self.try_list(auth, &filter, "e.updated_at DESC", page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to fetch emails")),
        }
    }

    pub async fn snoozed(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        match self.try_snoozed(auth, page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to fetch emails")),
        }
    }

    pub async fn emails_by_label(
        &self,
        auth: &AuthContext,
        label_id: i64,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> EmailListResponse {
        match self.try_by_label(auth, label_id, page, limit).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to fetch emails")),
        }
    }

    /// Fetch one message. Not-found and no-visibility are indistinguishable
    /// to the caller. Viewing as a recipient marks the caller's delivery
    /// read; the returned snapshot still shows the pre-view state.
    pub async fn email_by_id(&self, auth: &AuthContext, email_id: i64) -> EmailResponse {
        match self.try_email_by_id(auth, email_id).await {
            Ok(email) => EmailResponse::ok(email),
            Err(err) => EmailResponse::fail(failure_text(err, "Failed to fetch email")),
        }
    }

    async fn try_list(
        &self,
        auth: &AuthContext,
        filter: &str,
        order: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> MailResult<Vec<Email>> {
        let session = auth.require()?;
        let (limit, offset) = self.page_window(page, limit);
        self.list_view(session.user_id, filter, order, limit, offset)
            .await
    }

    async fn try_snoozed(
        &self,
        auth: &AuthContext,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> MailResult<Vec<Email>> {
        let session = auth.require()?;
        let (limit, offset) = self.page_window(page, limit);
        let sql = format!(
            "{EMAIL_SELECT} WHERE {RECIPIENT_OF} \
             AND e.scheduled_at IS NOT NULL AND e.scheduled_at > ?4 \
             AND e.is_trashed = 0 AND e.is_spam = 0 \
             ORDER BY e.scheduled_at ASC LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(limit)
            .bind(offset)
            .bind(Utc::now())
            .fetch_all(&self.db.pool)
            .await?;

        let mut emails: Vec<Email> = rows.iter().map(Database::email_from_row).collect();
        self.db.hydrate(&mut emails).await?;
        Ok(emails)
    }

    async fn try_by_label(
        &self,
        auth: &AuthContext,
        label_id: i64,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> MailResult<Vec<Email>> {
        let session = auth.require()?;
        let (limit, offset) = self.page_window(page, limit);
        let sql = format!(
            "{EMAIL_SELECT} WHERE \
             EXISTS (SELECT 1 FROM email_labels el WHERE el.email_id = e.id AND el.label_id = ?4) \
             AND {VISIBLE} AND e.is_trashed = 0 \
             ORDER BY e.sent_at DESC LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(limit)
            .bind(offset)
            .bind(label_id)
            .fetch_all(&self.db.pool)
            .await?;

        let mut emails: Vec<Email> = rows.iter().map(Database::email_from_row).collect();
        self.db.hydrate(&mut emails).await?;
        Ok(emails)
    }

    async fn try_email_by_id(&self, auth: &AuthContext, email_id: i64) -> MailResult<Email> {
        let session = auth.require()?;
        let sql = format!("{EMAIL_SELECT} WHERE e.id = ?2 AND {VISIBLE}");
        let row = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(email_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(MailboxError::NotFound("Email not found"))?;

        let mut email = Database::email_from_row(&row);
        self.db.hydrate(std::slice::from_mut(&mut email)).await?;
        email.read_receipts = self.db.receipts_for(email.id).await?;

        let unread_here = email
            .recipients
            .iter()
            .any(|r| r.user_id == session.user_id && !r.is_read);
        if unread_here {
            sqlx::query(
                "UPDATE recipients SET is_read = 1, read_at = ? \
                 WHERE email_id = ? AND user_id = ? AND is_read = 0",
            )
            .bind(Utc::now())
            .bind(email.id)
            .bind(session.user_id)
            .execute(&self.db.pool)
            .await?;
        }

        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::mailbox::Mailbox;
    use crate::mutations::SendEmail;
    use crate::session::{AuthContext, Session};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    async fn test_mailbox() -> (Mailbox, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            database_url: format!("sqlite:{}/wmail.db?mode=rwc", dir.path().display()),
            ..Config::default()
        };
        (Mailbox::connect(config).await.unwrap(), dir)
    }

    async fn login(mailbox: &Mailbox, email: &str) -> AuthContext {
        let user = mailbox.ensure_user(email, None).await.unwrap();
        AuthContext::authenticated(Session {
            user_id: user.id,
            email: user.email,
        })
    }

    #[tokio::test]
    async fn snoozed_lists_future_deliveries_soonest_first() {
        let (mailbox, _dir) = test_mailbox().await;
        let alice = login(&mailbox, "alice@example.com").await;
        let bob = login(&mailbox, "bob@example.com").await;

        for subject in ["later", "soon", "past"] {
            let sent = mailbox
                .send_email(
                    &alice,
                    SendEmail {
                        to: vec!["bob@example.com".into()],
                        subject: subject.into(),
                        body: "body".into(),
                        ..SendEmail::default()
                    },
                )
                .await;
            assert!(sent.success);
        }

        // No composer path sets scheduled_at; stage it directly.
        for (subject, offset) in [("later", 120), ("soon", 60), ("past", -60)] {
            sqlx::query("UPDATE emails SET scheduled_at = ? WHERE subject = ?")
                .bind(Utc::now() + Duration::minutes(offset))
                .bind(subject)
                .execute(&mailbox.db.pool)
                .await
                .unwrap();
        }

        let listed = mailbox.snoozed(&bob, None, None).await;
        assert!(listed.success);
        let subjects: Vec<&str> = listed.emails.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["soon", "later"]);

        // The sender is not a recipient, so nothing is snoozed for them.
        let for_sender = mailbox.snoozed(&alice, None, None).await;
        assert!(for_sender.success);
        assert!(for_sender.emails.is_empty());
    }

    #[tokio::test]
    async fn trash_wins_over_archive() {
        let (mailbox, _dir) = test_mailbox().await;
        let alice = login(&mailbox, "alice@example.com").await;

        let sent = mailbox
            .send_email(
                &alice,
                SendEmail {
                    to: vec!["bob@example.com".into()],
                    subject: "keep".into(),
                    body: "body".into(),
                    ..SendEmail::default()
                },
            )
            .await;
        let email_id = sent.email_id.unwrap();

        assert!(mailbox.archive_email(&alice, email_id).await.success);
        assert_eq!(mailbox.archived(&alice, None, None).await.emails.len(), 1);

        assert!(mailbox.move_to_trash(&alice, email_id).await.success);
        assert!(mailbox.archived(&alice, None, None).await.emails.is_empty());
        assert_eq!(mailbox.trashed(&alice, None, None).await.emails.len(), 1);
    }
}
