//! The ballot casting service.

use chrono::Utc;
use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::identity::EligibilityProvider;
use crate::model::{
    db::{
        audit::{AuditAction, NewAuditEntry},
        ballot::Ballot,
    },
    mongodb::Id,
};
use crate::store::{LedgerStore, StoreError};

use super::receipt::receipt_token;

/// Cast a ballot for `voter_id` in the given election.
///
/// The pre-checks here are advisory only; the store's insert re-verifies the
/// phase and the one-ballot-per-voter invariant atomically, so this is safe
/// under concurrent retries from the same voter. On success exactly one
/// ballot and one audit entry exist; on any failure, neither does.
pub async fn cast_ballot(
    store: &dyn LedgerStore,
    eligibility: &dyn EligibilityProvider,
    receipt_secret: &str,
    election_id: Id,
    voter_id: Id,
    candidate_id: Id,
) -> Result<Ballot> {
    let election = store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    if !election.is_open_at(Utc::now()) {
        return Err(Error::ElectionNotActive);
    }
    let candidate = election
        .candidate(candidate_id)
        .ok_or(Error::UnknownCandidate)?;
    if !eligibility.is_eligible(voter_id).await? {
        return Err(Error::NotEligible);
    }

    let ballot_id = Id::new();
    let ballot = Ballot {
        id: ballot_id,
        election_id: election.id,
        voter_id,
        candidate_id: candidate.id,
        cast_at: Utc::now(),
        receipt: receipt_token(receipt_secret, ballot_id),
    };

    let audit = NewAuditEntry::new(
        voter_id.to_string(),
        AuditAction::CastBallot,
        doc! {
            "election_id": *election.id,
            "candidate_id": *candidate.id,
        },
    );
    match store.insert_ballot(&ballot, audit).await {
        Ok(()) => Ok(ballot),
        Err(StoreError::Duplicate) => Err(Error::AlreadyVoted),
        // The election stopped being Active between our read and the insert.
        Err(StoreError::ConditionFailed) => Err(Error::ElectionNotActive),
        Err(err) => Err(err.into()),
    }
}
