use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::identity::EligibilityProvider;
use crate::model::{
    common::election::ElectionPhase,
    db::{
        audit::{AuditEntry, NewAuditEntry},
        ballot::Ballot,
        election::Election,
    },
    mongodb::Id,
};

use super::{LedgerStore, PublishOutcome, StoreError};

/// An in-memory ledger store, used by the test suite and for local
/// development (`db_uri = "memory"`).
///
/// A single mutex makes every operation atomic, which is exactly the
/// check-and-write contract of [`LedgerStore`]; the keyed ballot map plays
/// the role of the database's uniqueness index.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    elections: HashMap<Id, Election>,
    /// Keyed by `(election_id, voter_id)`: the uniqueness invariant.
    ballots: HashMap<(Id, Id), Ballot>,
    audit: Vec<AuditEntry>,
    /// Voter ID to eligibility flag, as written by registration.
    voters: HashMap<Id, bool>,
}

impl Inner {
    fn append_audit(&mut self, entry: NewAuditEntry) {
        self.audit.push(AuditEntry {
            id: Id::new(),
            entry,
        });
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a voter as the external registration flow would.
    pub fn register_voter(&self, voter_id: Id, eligible: bool) {
        self.locked().voters.insert(voter_id, eligible);
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[rocket::async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_election(
        &self,
        election: &Election,
        audit: NewAuditEntry,
    ) -> Result<(), StoreError> {
        let mut inner = self.locked();
        if inner.elections.contains_key(&election.id) {
            return Err(StoreError::Duplicate);
        }
        inner.elections.insert(election.id, election.clone());
        inner.append_audit(audit);
        Ok(())
    }

    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError> {
        Ok(self.locked().elections.get(&id).cloned())
    }

    async fn elections(&self) -> Result<Vec<Election>, StoreError> {
        Ok(self.locked().elections.values().cloned().collect())
    }

    async fn replace_election(
        &self,
        election: &Election,
        audit: NewAuditEntry,
    ) -> Result<bool, StoreError> {
        let mut inner = self.locked();
        let editable = inner
            .elections
            .get(&election.id)
            .map(|e| e.is_editable())
            .unwrap_or(false);
        if !editable {
            return Ok(false);
        }
        inner.elections.insert(election.id, election.clone());
        inner.append_audit(audit);
        Ok(true)
    }

    async fn update_phase(
        &self,
        id: Id,
        expected: ElectionPhase,
        target: ElectionPhase,
        audit: NewAuditEntry,
    ) -> Result<bool, StoreError> {
        let mut inner = self.locked();
        let updated = match inner.elections.get_mut(&id) {
            Some(election) if election.metadata.phase == expected => {
                election.metadata.phase = target;
                true
            }
            _ => false,
        };
        if updated {
            inner.append_audit(audit);
        }
        Ok(updated)
    }

    async fn publish_results(
        &self,
        id: Id,
        audit: NewAuditEntry,
    ) -> Result<PublishOutcome, StoreError> {
        let mut inner = self.locked();
        let outcome = match inner.elections.get_mut(&id) {
            None => PublishOutcome::NotFound,
            Some(election) if election.metadata.phase != ElectionPhase::Ended => {
                PublishOutcome::NotEnded
            }
            Some(election) if election.metadata.results_published => {
                PublishOutcome::AlreadyPublished
            }
            Some(election) => {
                election.metadata.results_published = true;
                PublishOutcome::Published
            }
        };
        if outcome == PublishOutcome::Published {
            inner.append_audit(audit);
        }
        Ok(outcome)
    }

    async fn delete_election(&self, id: Id, audit: NewAuditEntry) -> Result<bool, StoreError> {
        let mut inner = self.locked();
        if inner.ballots.keys().any(|(election_id, _)| *election_id == id) {
            return Err(StoreError::ConditionFailed);
        }
        if inner.elections.remove(&id).is_none() {
            return Ok(false);
        }
        inner.append_audit(audit);
        Ok(true)
    }

    async fn insert_ballot(
        &self,
        ballot: &Ballot,
        audit: NewAuditEntry,
    ) -> Result<(), StoreError> {
        let mut inner = self.locked();
        let active = inner
            .elections
            .get(&ballot.election_id)
            .map(|e| e.metadata.phase == ElectionPhase::Active)
            .unwrap_or(false);
        if !active {
            return Err(StoreError::ConditionFailed);
        }
        let key = (ballot.election_id, ballot.voter_id);
        if inner.ballots.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        inner.ballots.insert(key, ballot.clone());
        inner.append_audit(audit);
        Ok(())
    }

    async fn ballot_count(&self, election_id: Id) -> Result<u64, StoreError> {
        let inner = self.locked();
        Ok(inner
            .ballots
            .keys()
            .filter(|(id, _)| *id == election_id)
            .count() as u64)
    }

    async fn candidate_counts(&self, election_id: Id) -> Result<HashMap<Id, u64>, StoreError> {
        let inner = self.locked();
        let mut counts = HashMap::new();
        for ballot in inner.ballots.values() {
            if ballot.election_id == election_id {
                *counts.entry(ballot.candidate_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StoreError> {
        self.locked().append_audit(entry);
        Ok(())
    }

    async fn audit_log(
        &self,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<AuditEntry>, u64), StoreError> {
        let inner = self.locked();
        let mut entries = inner.audit.clone();
        entries.sort_by_key(|e| e.entry.timestamp);
        let total = entries.len() as u64;
        let page = entries
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[rocket::async_trait]
impl EligibilityProvider for MemoryStore {
    async fn is_eligible(&self, voter_id: Id) -> Result<bool, StoreError> {
        Ok(self.locked().voters.get(&voter_id).copied().unwrap_or(false))
    }

    async fn eligible_count(&self) -> Result<u64, StoreError> {
        Ok(self.locked().voters.values().filter(|e| **e).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use crate::model::db::audit::AuditAction;

    use super::*;

    fn audit() -> NewAuditEntry {
        NewAuditEntry::new("test", AuditAction::CreateElection, doc! {})
    }

    #[rocket::async_test]
    async fn ballot_uniqueness() {
        let store = MemoryStore::new();
        let election = Election::active_example();
        store.insert_election(&election, audit()).await.unwrap();

        let voter = Id::new();
        let candidate = election.candidates[0].id;
        let first = Ballot::new(election.id, voter, candidate, "r1".to_string());
        store.insert_ballot(&first, audit()).await.unwrap();

        // A second ballot from the same voter is rejected, whichever
        // candidate it names.
        let second = Ballot::new(election.id, voter, election.candidates[1].id, "r2".to_string());
        assert!(matches!(
            store.insert_ballot(&second, audit()).await,
            Err(StoreError::Duplicate)
        ));
        assert_eq!(store.ballot_count(election.id).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn ballots_only_into_active_elections() {
        let store = MemoryStore::new();
        let election = Election::scheduled_example();
        store.insert_election(&election, audit()).await.unwrap();

        let ballot = Ballot::new(
            election.id,
            Id::new(),
            election.candidates[0].id,
            "r".to_string(),
        );
        assert!(matches!(
            store.insert_ballot(&ballot, audit()).await,
            Err(StoreError::ConditionFailed)
        ));
        assert_eq!(store.ballot_count(election.id).await.unwrap(), 0);
    }

    #[rocket::async_test]
    async fn phase_update_is_conditional() {
        let store = MemoryStore::new();
        let election = Election::active_example();
        store.insert_election(&election, audit()).await.unwrap();

        // Winner.
        assert!(store
            .update_phase(
                election.id,
                ElectionPhase::Active,
                ElectionPhase::Ended,
                audit()
            )
            .await
            .unwrap());
        // Loser: the stored phase is no longer Active.
        assert!(!store
            .update_phase(
                election.id,
                ElectionPhase::Active,
                ElectionPhase::Paused,
                audit()
            )
            .await
            .unwrap());

        let stored = store.election(election.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.phase, ElectionPhase::Ended);
    }

    #[rocket::async_test]
    async fn delete_refused_while_ballots_exist() {
        let store = MemoryStore::new();
        let election = Election::active_example();
        store.insert_election(&election, audit()).await.unwrap();
        let ballot = Ballot::new(
            election.id,
            Id::new(),
            election.candidates[0].id,
            "r".to_string(),
        );
        store.insert_ballot(&ballot, audit()).await.unwrap();

        assert!(matches!(
            store.delete_election(election.id, audit()).await,
            Err(StoreError::ConditionFailed)
        ));
        assert!(store.election(election.id).await.unwrap().is_some());
        assert_eq!(store.ballot_count(election.id).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn audit_log_pages_in_order() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            store.append_audit(audit()).await.unwrap();
        }
        let (page, total) = store.audit_log(2, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert!(page[0].entry.timestamp <= page[1].entry.timestamp);
    }
}
