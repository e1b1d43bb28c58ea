use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Action names recorded in the audit log, one per state-changing operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateElection,
    EditElection,
    TransitionElection,
    PublishResults,
    DeleteElection,
    CastBallot,
    SendAnnouncement,
}

impl From<AuditAction> for Bson {
    fn from(action: AuditAction) -> Self {
        to_bson(&action).expect("Serialisation is infallible")
    }
}

/// An audit entry not yet assigned an ID by the store.
///
/// Entries are immutable and append-only. For state-changing operations the
/// entry is written in the same transaction as the state change itself:
/// either both land or neither does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    /// Who performed the action: an admin username, a voter ID, or `system`.
    pub actor: String,
    /// What was done.
    pub action: AuditAction,
    /// Structured details of the action.
    pub details: Document,
    /// When the action happened.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl NewAuditEntry {
    /// Create an entry timestamped now.
    pub fn new(actor: impl Into<String>, action: AuditAction, details: Document) -> Self {
        Self {
            actor: actor.into(),
            action,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// An audit entry from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Entry contents.
    #[serde(flatten)]
    pub entry: NewAuditEntry,
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;

    // `details` is a BSON document, so entries compare structurally but
    // cannot promise total equality.
    #[test]
    fn entries_compare_by_contents() {
        let entry = NewAuditEntry::new("admin", AuditAction::CreateElection, doc! {"count": 1});
        assert_eq!(entry.clone(), entry);

        let mut other = entry.clone();
        other.details = doc! {"count": 2};
        assert_ne!(other, entry);
    }
}
