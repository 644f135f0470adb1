use crate::config::Config;
use crate::db::{self, Database};
use crate::error::MailResult;
use crate::models::UserRef;
use crate::views::View;
use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// The mailbox data service. One instance per store; every operation takes
/// the caller's [`crate::AuthContext`] and returns a result envelope.
pub struct Mailbox {
    pub(crate) db: Database,
    pub(crate) config: Config,
    invalidations: Option<UnboundedSender<View>>,
}

impl Mailbox {
    pub async fn connect(config: Config) -> MailResult<Self> {
        let db = Database::new(&config.database_url).await?;
        db.run_migrations().await?;
        Ok(Self {
            db,
            config,
            invalidations: None,
        })
    }

    /// Subscribe to view invalidations. Each mutation pushes the partitions
    /// it staled; the consumer re-fetches those lists.
    pub fn invalidations(&mut self) -> UnboundedReceiver<View> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.invalidations = Some(tx);
        rx
    }

    pub(crate) fn invalidate(&self, views: &[View]) {
        if let Some(tx) = &self.invalidations {
            for view in views {
                let _ = tx.send(*view);
            }
        }
    }

    /// Clamp caller paging to the configured window and turn it into
    /// (limit, offset).
    pub(crate) fn page_window(&self, page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.config.page_size)
            .clamp(1, self.config.max_page_size);
        (limit, (page - 1) * limit)
    }

    /// Mirror an account from the external identity provider into the store
    /// (or fetch it if already present). Send uses the same find-or-create
    /// path for first-contact placeholder users.
    pub async fn ensure_user(&self, email: &str, name: Option<&str>) -> MailResult<UserRef> {
        let mut tx = self.db.pool.begin().await?;
        let user = db::find_or_create_user(&mut tx, email, name, Utc::now()).await?;
        tx.commit().await?;
        Ok(user)
    }
}
