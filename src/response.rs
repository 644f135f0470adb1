use crate::error::MailboxError;
use crate::models::{Email, Label, LabelWithCount, Notification, ReadReceipt};
use serde::Serialize;
use tracing::error;

/// Converts an operation error into the text surfaced to the caller.
/// Store faults are logged with full detail and replaced by the generic
/// fallback; every other variant already carries its public message.
pub(crate) fn failure_text(err: MailboxError, fallback: &str) -> String {
    match err {
        MailboxError::Database(e) => {
            error!(error = %e, "{}", fallback);
            fallback.to_string()
        }
        other => other.to_string(),
    }
}

/// Envelope for mutations with no payload.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub emails: Vec<Email>,
}

impl EmailListResponse {
    pub fn ok(emails: Vec<Email>) -> Self {
        Self {
            success: true,
            message: None,
            emails,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            emails: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub email: Option<Email>,
}

impl EmailResponse {
    pub fn ok(email: Email) -> Self {
        Self {
            success: true,
            message: None,
            email: Some(email),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            email: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub email_id: Option<i64>,
}

impl SendResponse {
    pub fn ok(email_id: i64) -> Self {
        Self {
            success: true,
            message: Some("Email sent successfully".into()),
            email_id: Some(email_id),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            email_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StarResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_starred: Option<bool>,
}

impl StarResponse {
    pub fn ok(is_starred: bool) -> Self {
        Self {
            success: true,
            message: None,
            is_starred: Some(is_starred),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            is_starred: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub label: Option<Label>,
}

impl LabelResponse {
    pub fn ok(label: Label) -> Self {
        Self {
            success: true,
            message: None,
            label: Some(label),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            label: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub labels: Vec<LabelWithCount>,
}

impl LabelListResponse {
    pub fn ok(labels: Vec<LabelWithCount>) -> Self {
        Self {
            success: true,
            message: None,
            labels,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub receipts: Vec<ReadReceipt>,
}

impl ReceiptListResponse {
    pub fn ok(receipts: Vec<ReadReceipt>) -> Self {
        Self {
            success: true,
            message: None,
            receipts,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            receipts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub notifications: Vec<Notification>,
}

impl NotificationListResponse {
    pub fn ok(notifications: Vec<Notification>) -> Self {
        Self {
            success: true,
            message: None,
            notifications,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            notifications: Vec::new(),
        }
    }
}
