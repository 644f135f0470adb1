use crate::error::MailResult;
use crate::models::{
    Attachment, Email, EmailRecipient, LabelRef, ReadReceipt, RecipientKind, UserRef,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};

/// Visibility predicate for queries that alias the emails table as `e` and
/// bind the caller's user id as parameter 1.
pub(crate) const VISIBLE: &str = "(e.sender_id = ?1 OR EXISTS (SELECT 1 FROM recipients r WHERE r.email_id = e.id AND r.user_id = ?1))";

/// Same predicate for statements that target the emails table unaliased.
pub(crate) const VISIBLE_UNALIASED: &str = "(emails.sender_id = ?1 OR EXISTS (SELECT 1 FROM recipients r WHERE r.email_id = emails.id AND r.user_id = ?1))";

pub(crate) const RECIPIENT_OF: &str =
    "EXISTS (SELECT 1 FROM recipients r WHERE r.email_id = e.id AND r.user_id = ?1)";

pub(crate) const EMAIL_SELECT: &str = "SELECT e.id, e.subject, e.body, e.body_html, e.sender_id, e.thread_id, \
     e.is_draft, e.is_starred, e.is_trashed, e.is_spam, e.is_archived, \
     e.scheduled_at, e.sent_at, e.created_at, e.updated_at, \
     u.name, u.email, u.image \
     FROM emails e JOIN users u ON u.id = e.sender_id";

pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> MailResult<Self> {
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> MailResult<()> {
        let schema = include_str!("../schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn email_from_row(row: &SqliteRow) -> Email {
        Email {
            id: row.get(0),
            subject: row.get(1),
            body: row.get(2),
            body_html: row.get(3),
            sender_id: row.get(4),
            thread_id: row.get(5),
            is_draft: row.get(6),
            is_starred: row.get(7),
            is_trashed: row.get(8),
            is_spam: row.get(9),
            is_archived: row.get(10),
            scheduled_at: row.get(11),
            sent_at: row.get(12),
            created_at: row.get(13),
            updated_at: row.get(14),
            sender: UserRef {
                id: row.get(4),
                name: row.get(15),
                email: row.get(16),
                image: row.get(17),
            },
            recipients: Vec::new(),
            attachments: Vec::new(),
            labels: Vec::new(),
            read_receipts: Vec::new(),
        }
    }

    pub(crate) async fn hydrate(&self, emails: &mut [Email]) -> MailResult<()> {
        for email in emails.iter_mut() {
            email.recipients = self.recipients_for(email.id).await?;
            email.attachments = self.attachments_for(email.id).await?;
            email.labels = self.labels_for(email.id).await?;
        }
        Ok(())
    }

    pub(crate) async fn recipients_for(&self, email_id: i64) -> MailResult<Vec<EmailRecipient>> {
        let rows = sqlx::query(
            "SELECT r.id, r.email_id, r.user_id, r.kind, r.is_read, r.read_at, \
             u.name, u.email, u.image \
             FROM recipients r JOIN users u ON u.id = r.user_id \
             WHERE r.email_id = ? ORDER BY r.id",
        )
        .bind(email_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| EmailRecipient {
                id: row.get(0),
                email_id: row.get(1),
                user_id: row.get(2),
                kind: RecipientKind::parse(&row.get::<String, _>(3)),
                is_read: row.get(4),
                read_at: row.get(5),
                user: UserRef {
                    id: row.get(2),
                    name: row.get(6),
                    email: row.get(7),
                    image: row.get(8),
                },
            })
            .collect())
    }

    pub(crate) async fn attachments_for(&self, email_id: i64) -> MailResult<Vec<Attachment>> {
        let attachments = sqlx::query_as::<_, Attachment>(
            "SELECT id, email_id, filename, mime_type, size, url, created_at \
             FROM attachments WHERE email_id = ? ORDER BY id",
        )
        .bind(email_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attachments)
    }

    pub(crate) async fn labels_for(&self, email_id: i64) -> MailResult<Vec<LabelRef>> {
        let labels = sqlx::query_as::<_, LabelRef>(
            "SELECT l.id, l.name, l.color \
             FROM email_labels el JOIN labels l ON l.id = el.label_id \
             WHERE el.email_id = ? ORDER BY l.name",
        )
        .bind(email_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(labels)
    }

    pub(crate) async fn receipts_for(&self, email_id: i64) -> MailResult<Vec<ReadReceipt>> {
        let rows = sqlx::query(
            "SELECT rr.id, rr.email_id, rr.user_id, rr.read_at, u.name, u.email, u.image \
             FROM read_receipts rr JOIN users u ON u.id = rr.user_id \
             WHERE rr.email_id = ? ORDER BY rr.read_at DESC",
        )
        .bind(email_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ReadReceipt {
                id: row.get(0),
                email_id: row.get(1),
                user_id: row.get(2),
                read_at: row.get(3),
                user: UserRef {
                    id: row.get(2),
                    name: row.get(4),
                    email: row.get(5),
                    image: row.get(6),
                },
            })
            .collect())
    }

    pub(crate) async fn email_visible(&self, user_id: i64, email_id: i64) -> MailResult<bool> {
        let sql = format!("SELECT 1 FROM emails e WHERE e.id = ?2 AND {VISIBLE}");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(email_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

/// Find-or-create keyed by the unique email column. A concurrent insert of
/// the same address loses the race on the constraint and falls through to
/// the re-select.
pub(crate) async fn find_or_create_user(
    tx: &mut Transaction<'_, Sqlite>,
    address: &str,
    display_name: Option<&str>,
    now: DateTime<Utc>,
) -> MailResult<UserRef> {
    let placeholder = address.split('@').next().unwrap_or_default();
    let name = display_name.unwrap_or(placeholder);

    sqlx::query(
        "INSERT INTO users (name, email, created_at, updated_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT(email) DO NOTHING",
    )
    .bind(name)
    .bind(address)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let user = sqlx::query_as::<_, UserRef>(
        "SELECT id, name, email, image FROM users WHERE email = ?",
    )
    .bind(address)
    .fetch_one(&mut **tx)
    .await?;

    Ok(user)
}
