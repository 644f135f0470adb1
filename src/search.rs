use crate::db::{Database, EMAIL_SELECT, VISIBLE};
use crate::error::MailResult;
use crate::mailbox::Mailbox;
use crate::models::Email;
use crate::response::{EmailListResponse, failure_text};
use crate::session::AuthContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conjunctive advanced-search filter. Omitted fields impose no constraint;
/// every present field contributes one AND predicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub has_words: Option<String>,
    pub doesnt_have: Option<String>,
    pub has_attachment: Option<bool>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Time(DateTime<Utc>),
}

/// Substring matching goes through instr(lower(..)) so user input never
/// meets LIKE wildcard syntax.
fn filter_clauses(filters: &SearchFilters) -> (Vec<&'static str>, Vec<Bind>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    if let Some(from) = &filters.from {
        clauses.push(
            "(instr(lower(u.email), lower(?)) > 0 OR instr(lower(coalesce(u.name, '')), lower(?)) > 0)",
        );
        binds.push(Bind::Text(from.clone()));
        binds.push(Bind::Text(from.clone()));
    }
    if let Some(to) = &filters.to {
        clauses.push(
            "EXISTS (SELECT 1 FROM recipients tr JOIN users tu ON tu.id = tr.user_id \
             WHERE tr.email_id = e.id AND (instr(lower(tu.email), lower(?)) > 0 \
             OR instr(lower(coalesce(tu.name, '')), lower(?)) > 0))",
        );
        binds.push(Bind::Text(to.clone()));
        binds.push(Bind::Text(to.clone()));
    }
    if let Some(subject) = &filters.subject {
        clauses.push("instr(lower(e.subject), lower(?)) > 0");
        binds.push(Bind::Text(subject.clone()));
    }
    if let Some(words) = &filters.has_words {
        clauses.push(
            "(instr(lower(e.subject), lower(?)) > 0 OR instr(lower(e.body), lower(?)) > 0)",
        );
        binds.push(Bind::Text(words.clone()));
        binds.push(Bind::Text(words.clone()));
    }
    if let Some(excluded) = &filters.doesnt_have {
        // A hit in either field disqualifies the message.
        clauses.push(
            "(instr(lower(e.subject), lower(?)) = 0 AND instr(lower(e.body), lower(?)) = 0)",
        );
        binds.push(Bind::Text(excluded.clone()));
        binds.push(Bind::Text(excluded.clone()));
    }
    if filters.has_attachment == Some(true) {
        clauses.push("EXISTS (SELECT 1 FROM attachments a WHERE a.email_id = e.id)");
    }
    if let Some(date_from) = filters.date_from {
        clauses.push("e.sent_at >= ?");
        binds.push(Bind::Time(date_from));
    }
    if let Some(date_to) = filters.date_to {
        clauses.push("e.sent_at <= ?");
        binds.push(Bind::Time(date_to));
    }

    (clauses, binds)
}

impl Mailbox {
    /// Case-insensitive substring search over subject, body and sender
    /// identity within the caller's visible, non-trashed messages.
    pub async fn search(&self, auth: &AuthContext, query: &str) -> EmailListResponse {
        match self.try_search(auth, query).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to search emails")),
        }
    }

    pub async fn advanced_search(
        &self,
        auth: &AuthContext,
        filters: SearchFilters,
    ) -> EmailListResponse {
        match self.try_advanced_search(auth, filters).await {
            Ok(emails) => EmailListResponse::ok(emails),
            Err(err) => EmailListResponse::fail(failure_text(err, "Failed to search emails")),
        }
    }

    async fn try_search(&self, auth: &AuthContext, query: &str) -> MailResult<Vec<Email>> {
        let session = auth.require()?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{EMAIL_SELECT} WHERE {VISIBLE} AND e.is_trashed = 0 AND \
             (instr(lower(e.subject), lower(?2)) > 0 \
             OR instr(lower(e.body), lower(?2)) > 0 \
             OR instr(lower(u.email), lower(?2)) > 0 \
             OR instr(lower(coalesce(u.name, '')), lower(?2)) > 0) \
             ORDER BY e.sent_at DESC LIMIT ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(query)
            .bind(self.config.page_size)
            .fetch_all(&self.db.pool)
            .await?;

        let mut emails: Vec<Email> = rows.iter().map(Database::email_from_row).collect();
        self.db.hydrate(&mut emails).await?;
        Ok(emails)
    }

    async fn try_advanced_search(
        &self,
        auth: &AuthContext,
        filters: SearchFilters,
    ) -> MailResult<Vec<Email>> {
        let session = auth.require()?;
        let (clauses, binds) = filter_clauses(&filters);

        let mut sql = format!(
            "{EMAIL_SELECT} WHERE (e.sender_id = ? OR EXISTS \
             (SELECT 1 FROM recipients r WHERE r.email_id = e.id AND r.user_id = ?)) \
             AND e.is_trashed = 0"
        );
        for clause in &clauses {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        sql.push_str(" ORDER BY e.sent_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(session.user_id);
        for bind in binds {
            query = match bind {
                Bind::Text(text) => query.bind(text),
                Bind::Time(time) => query.bind(time),
            };
        }
        query = query.bind(self.config.advanced_search_limit);

        let rows = query.fetch_all(&self.db.pool).await?;
        let mut emails: Vec<Email> = rows.iter().map(Database::email_from_row).collect();
        self.db.hydrate(&mut emails).await?;
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filters_no_clauses() {
        let (clauses, binds) = filter_clauses(&SearchFilters::default());
        assert!(clauses.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn each_text_filter_binds_its_term() {
        let filters = SearchFilters {
            from: Some("alice".into()),
            subject: Some("report".into()),
            has_words: Some("q3".into()),
            ..SearchFilters::default()
        };
        let (clauses, binds) = filter_clauses(&filters);
        assert_eq!(clauses.len(), 3);
        // from and has_words probe two columns each, subject one.
        assert_eq!(binds.len(), 5);
    }

    #[test]
    fn doesnt_have_excludes_on_both_fields() {
        let filters = SearchFilters {
            doesnt_have: Some("spam".into()),
            ..SearchFilters::default()
        };
        let (clauses, _) = filter_clauses(&filters);
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].contains("= 0 AND"));
    }

    #[test]
    fn has_attachment_false_is_no_constraint() {
        let filters = SearchFilters {
            has_attachment: Some(false),
            ..SearchFilters::default()
        };
        let (clauses, binds) = filter_clauses(&filters);
        assert!(clauses.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn date_bounds_are_inclusive_predicates() {
        let now = Utc::now();
        let filters = SearchFilters {
            date_from: Some(now),
            date_to: Some(now),
            ..SearchFilters::default()
        };
        let (clauses, binds) = filter_clauses(&filters);
        assert_eq!(clauses, vec!["e.sent_at >= ?", "e.sent_at <= ?"]);
        assert_eq!(binds.len(), 2);
    }
}
