use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user projection embedded in emails, recipients and receipts. The raw
/// `users` row (with its password column) never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRef {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::To => "TO",
            RecipientKind::Cc => "CC",
            RecipientKind::Bcc => "BCC",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "CC" => RecipientKind::Cc,
            "BCC" => RecipientKind::Bcc,
            _ => RecipientKind::To,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub id: i64,
    pub email_id: i64,
    pub user_id: i64,
    pub kind: RecipientKind,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub user: UserRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attachment {
    pub id: i64,
    pub email_id: i64,
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Label projection carried by hydrated emails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LabelRef {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A label the caller has associated, annotated with the number of
/// non-trashed messages visible to them that carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelWithCount {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub id: i64,
    pub email_id: i64,
    pub user_id: i64,
    pub read_at: DateTime<Utc>,
    pub user: UserRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub id: i64,
    pub subject: String,
    pub body: String,
    pub body_html: Option<String>,
    pub sender_id: i64,
    pub thread_id: Option<i64>,
    pub is_draft: bool,
    pub is_starred: bool,
    pub is_trashed: bool,
    pub is_spam: bool,
    pub is_archived: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sender: UserRef,
    pub recipients: Vec<EmailRecipient>,
    pub attachments: Vec<Attachment>,
    pub labels: Vec<LabelRef>,
    // Populated by the single-message fetch only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_receipts: Vec<ReadReceipt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    NewEmail,
    ReadReceipt,
    Mention,
    Reply,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewEmail => "NEW_EMAIL",
            NotificationKind::ReadReceipt => "READ_RECEIPT",
            NotificationKind::Mention => "MENTION",
            NotificationKind::Reply => "REPLY",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "READ_RECEIPT" => NotificationKind::ReadReceipt,
            "MENTION" => NotificationKind::Mention,
            "REPLY" => NotificationKind::Reply,
            _ => NotificationKind::NewEmail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub email_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
