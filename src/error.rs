use thiserror::Error;

/// Operation-level error taxonomy. Everything is converted to a result
/// envelope at the operation boundary; `Database` is the only variant whose
/// detail is logged instead of surfaced.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("Unauthorized")]
    Unauthorized,

    /// Input failed a schema check. Carries the first failing field's
    /// human-readable message.
    #[error("{0}")]
    Validation(String),

    /// The target doesn't exist or the caller has no visibility into it.
    /// Both causes share one message so existence never leaks.
    #[error("{0}")]
    NotFound(&'static str),

    /// Duplicate creation attempt.
    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type MailResult<T> = std::result::Result<T, MailboxError>;

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}
