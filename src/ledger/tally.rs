//! The tally engine. Reads only; never mutates the ledger.

use crate::error::{Error, Result};
use crate::identity::EligibilityProvider;
use crate::model::{
    api::tally::{TallySnapshot, Turnout},
    common::election::ElectionPhase,
    mongodb::Id,
};
use crate::store::LedgerStore;

/// Compute the current tally for an election.
///
/// Counts come from a single snapshot read of the ledger, so a ballot being
/// written concurrently either fully counts or not at all. The eligible-voter
/// denominator is taken at query time.
pub async fn tally(
    store: &dyn LedgerStore,
    eligibility: &dyn EligibilityProvider,
    election_id: Id,
) -> Result<TallySnapshot> {
    let election = store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    let counts = store.candidate_counts(election_id).await?;
    let eligible = eligibility.eligible_count().await?;
    Ok(TallySnapshot::new(&election, counts, eligible))
}

/// Turnout for an election that is currently `Active`, cheap enough to poll
/// every few seconds.
pub async fn live_turnout(
    store: &dyn LedgerStore,
    eligibility: &dyn EligibilityProvider,
    election_id: Id,
) -> Result<Turnout> {
    let election = store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    if election.metadata.phase != ElectionPhase::Active {
        return Err(Error::ElectionNotActive);
    }
    let counts = store.candidate_counts(election_id).await?;
    let eligible = eligibility.eligible_count().await?;
    Ok(TallySnapshot::new(&election, counts, eligible).into())
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use crate::model::db::{
        audit::{AuditAction, NewAuditEntry},
        ballot::Ballot,
        election::Election,
    };
    use crate::store::MemoryStore;

    use super::*;

    async fn store_with_ballots(votes: &[usize]) -> (MemoryStore, Election) {
        let store = MemoryStore::new();
        let election = Election::active_example();
        let audit = NewAuditEntry::new("admin", AuditAction::CreateElection, doc! {});
        store.insert_election(&election, audit).await.unwrap();
        for &candidate_index in votes {
            let voter = Id::new();
            store.register_voter(voter, true);
            let ballot = Ballot::new(
                election.id,
                voter,
                election.candidates[candidate_index].id,
                "r".to_string(),
            );
            let audit = NewAuditEntry::new("voter", AuditAction::CastBallot, doc! {});
            store.insert_ballot(&ballot, audit).await.unwrap();
        }
        (store, election)
    }

    #[rocket::async_test]
    async fn counts_group_by_candidate_and_sum_to_total() {
        let (store, election) = store_with_ballots(&[0, 0, 1, 0]).await;
        let snapshot = tally(&store, &store, election.id).await.unwrap();

        assert_eq!(snapshot.total_ballots, 4);
        let by_id: std::collections::HashMap<_, _> = snapshot
            .candidates
            .iter()
            .map(|c| (c.candidate_id, c.votes))
            .collect();
        assert_eq!(by_id[&election.candidates[0].id], 3);
        assert_eq!(by_id[&election.candidates[1].id], 1);
        assert_eq!(
            snapshot.candidates.iter().map(|c| c.votes).sum::<u64>(),
            snapshot.total_ballots
        );
    }

    #[rocket::async_test]
    async fn candidates_without_ballots_count_zero() {
        let (store, election) = store_with_ballots(&[0]).await;
        let snapshot = tally(&store, &store, election.id).await.unwrap();
        assert_eq!(snapshot.candidates.len(), election.candidates.len());
        assert!(snapshot
            .candidates
            .iter()
            .any(|c| c.candidate_id == election.candidates[1].id && c.votes == 0));
    }

    #[rocket::async_test]
    async fn turnout_uses_eligible_voters_at_query_time() {
        let (store, election) = store_with_ballots(&[0, 1]).await;
        let before = tally(&store, &store, election.id).await.unwrap();
        assert_eq!(before.eligible_voters, 2);
        assert!((before.turnout - 1.0).abs() < f64::EPSILON);

        // New registrations dilute turnout immediately.
        store.register_voter(Id::new(), true);
        store.register_voter(Id::new(), true);
        let after = tally(&store, &store, election.id).await.unwrap();
        assert_eq!(after.eligible_voters, 4);
        assert!((after.turnout - 0.5).abs() < f64::EPSILON);
    }

    #[rocket::async_test]
    async fn turnout_is_zero_with_no_eligible_voters() {
        let store = MemoryStore::new();
        let election = Election::active_example();
        let audit = NewAuditEntry::new("admin", AuditAction::CreateElection, doc! {});
        store.insert_election(&election, audit).await.unwrap();

        let snapshot = tally(&store, &store, election.id).await.unwrap();
        assert_eq!(snapshot.eligible_voters, 0);
        assert_eq!(snapshot.turnout, 0.0);
    }

    #[rocket::async_test]
    async fn live_turnout_requires_active_phase() {
        let store = MemoryStore::new();
        let election = Election::ended_example();
        let audit = NewAuditEntry::new("admin", AuditAction::CreateElection, doc! {});
        store.insert_election(&election, audit).await.unwrap();

        assert!(matches!(
            live_turnout(&store, &store, election.id).await,
            Err(Error::ElectionNotActive)
        ));
    }

    #[rocket::async_test]
    async fn live_turnout_reports_current_figures() {
        let (store, election) = store_with_ballots(&[0, 1, 1]).await;
        let turnout = live_turnout(&store, &store, election.id).await.unwrap();
        assert_eq!(turnout.total_ballots, 3);
        assert_eq!(turnout.eligible_voters, 3);
    }
}
