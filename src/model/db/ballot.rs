use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// One voter's recorded choice for one election, as stored in the database.
///
/// Ballots are append-only: they are never edited or deleted once written,
/// and the store enforces uniqueness over `(election_id, voter_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// Foreign key election ID.
    pub election_id: Id,
    /// Foreign key voter ID. Unique per election.
    pub voter_id: Id,
    /// Foreign key candidate ID.
    pub candidate_id: Id,
    /// When the ballot was cast.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// Opaque voter-facing confirmation token.
    pub receipt: String,
}

impl Ballot {
    /// Create a new ballot cast now. The receipt must already be derived from
    /// the caller's receipt key; see `ledger::receipt`.
    pub fn new(election_id: Id, voter_id: Id, candidate_id: Id, receipt: String) -> Self {
        Self {
            id: Id::new(),
            election_id,
            voter_id,
            candidate_id,
            cast_at: Utc::now(),
            receipt,
        }
    }
}
