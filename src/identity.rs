//! Voter eligibility checks against the registration data.
//!
//! Registration and biometric verification happen in a separate system; this
//! module only reads the voter records that system maintains.

use mongodb::{bson::doc, Database};

use crate::model::{
    db::voter::Voter,
    mongodb::{Coll, Id},
};
use crate::store::StoreError;

/// Read-only access to voter eligibility.
#[rocket::async_trait]
pub trait EligibilityProvider: Send + Sync {
    /// Whether the given voter is registered and eligible to vote.
    ///
    /// Unknown voters are not eligible.
    async fn is_eligible(&self, voter_id: Id) -> Result<bool, StoreError>;

    /// The number of eligible voters, used as the turnout denominator.
    async fn eligible_count(&self) -> Result<u64, StoreError>;
}

/// The voter registry maintained by the registration flow, read from the
/// shared database.
pub struct VoterRegistry {
    voters: Coll<Voter>,
}

impl VoterRegistry {
    pub fn new(db: &Database) -> Self {
        Self {
            voters: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl EligibilityProvider for VoterRegistry {
    async fn is_eligible(&self, voter_id: Id) -> Result<bool, StoreError> {
        let voter = self.voters.find_one(voter_id.as_doc(), None).await?;
        Ok(voter.map(|v| v.eligible).unwrap_or(false))
    }

    async fn eligible_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .voters
            .count_documents(doc! {"eligible": true}, None)
            .await?)
    }
}
