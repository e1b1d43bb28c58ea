use chrono::{DateTime, Utc};
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};

use crate::model::{
    db::audit::{AuditAction, AuditEntry},
    mongodb::Id,
};

/// Client-facing view of an audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntryDescription {
    pub id: Id,
    pub actor: String,
    pub action: AuditAction,
    pub details: Document,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditEntry> for AuditEntryDescription {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id,
            actor: entry.entry.actor,
            action: entry.entry.action,
            details: entry.entry.details,
            timestamp: entry.entry.timestamp,
        }
    }
}
