//! The persistence boundary of the ballot ledger.
//!
//! Every cross-entity invariant — one ballot per voter per election, casting
//! only into an `Active` election, phase transitions keyed on the expected
//! current phase — is enforced here with single atomic check-and-write
//! primitives, never by a read-then-write in the caller.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{
    common::election::ElectionPhase,
    db::{
        audit::{AuditEntry, NewAuditEntry},
        ballot::Ballot,
        election::Election,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Errors at the persistence boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("write rejected by uniqueness constraint")]
    Duplicate,
    /// A conditional write found its precondition no longer true.
    #[error("conditional write precondition failed")]
    ConditionFailed,
    /// The store could not be reached or timed out; transient and retryable.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] mongodb::error::Error),
}

/// Outcome of [`LedgerStore::publish_results`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The flag was flipped now; the audit entry was appended.
    Published,
    /// Already published; nothing was written.
    AlreadyPublished,
    /// The election has not ended; nothing was written.
    NotEnded,
    /// No such election.
    NotFound,
}

/// Durable storage for elections, the append-only ballot ledger, and the
/// audit log.
///
/// Methods that change state take the audit entry describing the change and
/// write it atomically with the change itself: on any failure path, neither
/// the state change nor the audit entry is visible to readers.
#[rocket::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new election.
    async fn insert_election(
        &self,
        election: &Election,
        audit: NewAuditEntry,
    ) -> Result<(), StoreError>;

    /// Fetch an election by ID.
    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError>;

    /// Fetch all elections.
    async fn elections(&self) -> Result<Vec<Election>, StoreError>;

    /// Replace an election's data, guarded on the stored election still being
    /// editable (Draft or Scheduled). Returns false if the guard failed or
    /// the election is gone.
    async fn replace_election(
        &self,
        election: &Election,
        audit: NewAuditEntry,
    ) -> Result<bool, StoreError>;

    /// Move an election from `expected` to `target` phase, conditional on the
    /// stored phase still being `expected`. Returns false if the condition
    /// failed; concurrent transitions on one election thereby resolve to a
    /// single winner.
    async fn update_phase(
        &self,
        id: Id,
        expected: ElectionPhase,
        target: ElectionPhase,
        audit: NewAuditEntry,
    ) -> Result<bool, StoreError>;

    /// Flip `results_published` on an `Ended` election. Idempotent: the audit
    /// entry is appended only when the flag actually flips.
    async fn publish_results(
        &self,
        id: Id,
        audit: NewAuditEntry,
    ) -> Result<PublishOutcome, StoreError>;

    /// Delete an election and its embedded candidates, only if no ballot
    /// references it (`ConditionFailed` otherwise). Returns false if the
    /// election did not exist.
    async fn delete_election(&self, id: Id, audit: NewAuditEntry) -> Result<bool, StoreError>;

    /// Append a ballot to the ledger.
    ///
    /// Atomically re-verifies that the election is `Active`
    /// (`ConditionFailed` otherwise) and that no ballot exists for this
    /// `(election_id, voter_id)` pair (`Duplicate` otherwise). Safe under
    /// concurrent retries from the same voter: at most one insert wins, and
    /// no partial ballot is ever visible.
    async fn insert_ballot(&self, ballot: &Ballot, audit: NewAuditEntry)
        -> Result<(), StoreError>;

    /// Number of ballots cast in the given election.
    async fn ballot_count(&self, election_id: Id) -> Result<u64, StoreError>;

    /// Ballot counts grouped by candidate, from a single snapshot read:
    /// a concurrently-written ballot either fully counts or not at all.
    async fn candidate_counts(&self, election_id: Id) -> Result<HashMap<Id, u64>, StoreError>;

    /// Append a standalone audit entry (for actions with no other state
    /// change, e.g. announcements).
    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StoreError>;

    /// A page of the audit log in timestamp order, plus the total entry
    /// count.
    async fn audit_log(&self, skip: u64, limit: u64)
        -> Result<(Vec<AuditEntry>, u64), StoreError>;
}
