use crate::error::{MailResult, MailboxError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The authenticated identity every operation is scoped by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub email: String,
}

/// Where sessions come from. Implemented by the embedding application's
/// authentication layer; the core only ever consumes the resolved identity.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> Option<Session>;
}

#[async_trait]
impl SessionProvider for Session {
    async fn current_session(&self) -> Option<Session> {
        Some(self.clone())
    }
}

/// Identity resolved once at the request boundary and threaded explicitly
/// into every operation. Business logic never reads ambient state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    session: Option<Session>,
}

impl AuthContext {
    pub async fn resolve(provider: &dyn SessionProvider) -> Self {
        Self {
            session: provider.current_session().await,
        }
    }

    pub fn authenticated(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub(crate) fn require(&self) -> MailResult<&Session> {
        self.session.as_ref().ok_or(MailboxError::Unauthorized)
    }
}
