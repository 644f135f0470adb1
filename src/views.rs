use serde::{Deserialize, Serialize};

/// The view partitions a mutation can stale. Mutations push the affected
/// partitions onto the invalidation channel so the presentation layer knows
/// which lists to re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Inbox,
    Sent,
    Drafts,
    Starred,
    Snoozed,
    Spam,
    Archive,
    Trash,
}
