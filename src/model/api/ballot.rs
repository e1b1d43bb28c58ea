use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{db::ballot::Ballot, mongodb::Id};

/// Voter-facing confirmation of a successful cast.
///
/// Deliberately omits the candidate: possession of a receipt must not link a
/// voter to their choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    /// The opaque confirmation token.
    pub receipt: String,
    /// The election the ballot was cast in.
    pub election_id: Id,
    /// When the ballot was cast.
    pub cast_at: DateTime<Utc>,
}

impl From<Ballot> for BallotReceipt {
    fn from(ballot: Ballot) -> Self {
        Self {
            receipt: ballot.receipt,
            election_id: ballot.election_id,
            cast_at: ballot.cast_at,
        }
    }
}
