use std::collections::HashMap;
use std::time::Duration;

use mongodb::{
    bson::{self, doc},
    error::Error as DbError,
    options::{ClientOptions, FindOptions},
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::model::{
    common::election::ElectionPhase,
    db::{
        audit::{AuditEntry, NewAuditEntry},
        ballot::Ballot,
        election::Election,
    },
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll, Id},
};

use super::{LedgerStore, PublishOutcome, StoreError};

/// The production database name.
const DATABASE: &str = "biopoll";

/// The MongoDB-backed ledger store.
///
/// Atomicity comes from two database features: the unique index over
/// `(election_id, voter_id)` on the ballot collection, and multi-document
/// transactions pairing each state change with its audit entry.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the database, bounding I/O with the given timeout, and
    /// ensure the required indexes exist.
    pub async fn connect(uri: &str, timeout: Duration) -> Result<Self, DbError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        let client = Client::with_options(options)?;
        let db = client.database(DATABASE);
        ensure_indexes_exist(&db).await?;
        Ok(Self { client, db })
    }

    /// The underlying database, shared with the voter registry.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn election_coll(&self) -> Coll<Election> {
        Coll::from_db(&self.db)
    }

    fn ballot_coll(&self) -> Coll<Ballot> {
        Coll::from_db(&self.db)
    }

    fn new_audit_coll(&self) -> Coll<NewAuditEntry> {
        Coll::from_db(&self.db)
    }

    fn audit_coll(&self) -> Coll<AuditEntry> {
        Coll::from_db(&self.db)
    }

    /// Start a session with an open transaction.
    async fn transaction(&self) -> Result<ClientSession, DbError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(session)
    }
}

#[rocket::async_trait]
impl LedgerStore for MongoStore {
    async fn insert_election(
        &self,
        election: &Election,
        audit: NewAuditEntry,
    ) -> Result<(), StoreError> {
        let mut session = self.transaction().await?;
        self.election_coll()
            .insert_one_with_session(election, None, &mut session)
            .await?;
        self.new_audit_coll()
            .insert_one_with_session(&audit, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(())
    }

    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError> {
        Ok(self.election_coll().find_one(id.as_doc(), None).await?)
    }

    async fn elections(&self) -> Result<Vec<Election>, StoreError> {
        Ok(self.election_coll().find(None, None).await?.try_collect().await?)
    }

    async fn replace_election(
        &self,
        election: &Election,
        audit: NewAuditEntry,
    ) -> Result<bool, StoreError> {
        // Guard on the stored election still being editable, so a concurrent
        // activation cannot be overwritten with stale data.
        let filter = doc! {
            "_id": *election.id,
            "$or": [
                {"phase": ElectionPhase::Draft},
                {"phase": ElectionPhase::Scheduled},
            ],
        };
        let mut session = self.transaction().await?;
        let result = self
            .election_coll()
            .replace_one_with_session(filter, election, None, &mut session)
            .await?;
        if result.modified_count != 1 {
            session.abort_transaction().await?;
            return Ok(false);
        }
        self.new_audit_coll()
            .insert_one_with_session(&audit, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn update_phase(
        &self,
        id: Id,
        expected: ElectionPhase,
        target: ElectionPhase,
        audit: NewAuditEntry,
    ) -> Result<bool, StoreError> {
        let filter = doc! {
            "_id": *id,
            "phase": expected,
        };
        let update = doc! {
            "$set": {
                "phase": target,
            }
        };
        let mut session = self.transaction().await?;
        let result = self
            .election_coll()
            .update_one_with_session(filter, update, None, &mut session)
            .await?;
        if result.modified_count != 1 {
            session.abort_transaction().await?;
            return Ok(false);
        }
        self.new_audit_coll()
            .insert_one_with_session(&audit, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn publish_results(
        &self,
        id: Id,
        audit: NewAuditEntry,
    ) -> Result<PublishOutcome, StoreError> {
        let mut session = self.transaction().await?;
        let election = self
            .election_coll()
            .find_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        let election = match election {
            Some(election) => election,
            None => {
                session.abort_transaction().await?;
                return Ok(PublishOutcome::NotFound);
            }
        };
        if election.metadata.phase != ElectionPhase::Ended {
            session.abort_transaction().await?;
            return Ok(PublishOutcome::NotEnded);
        }
        if election.metadata.results_published {
            session.abort_transaction().await?;
            return Ok(PublishOutcome::AlreadyPublished);
        }

        let filter = doc! {
            "_id": *id,
            "phase": ElectionPhase::Ended,
            "results_published": false,
        };
        let update = doc! {
            "$set": {
                "results_published": true,
            }
        };
        let result = self
            .election_coll()
            .update_one_with_session(filter, update, None, &mut session)
            .await?;
        if result.modified_count != 1 {
            session.abort_transaction().await?;
            return Err(StoreError::ConditionFailed);
        }
        self.new_audit_coll()
            .insert_one_with_session(&audit, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(PublishOutcome::Published)
    }

    async fn delete_election(&self, id: Id, audit: NewAuditEntry) -> Result<bool, StoreError> {
        let mut session = self.transaction().await?;
        // Touch the election document before counting ballots. The count is
        // a read, and snapshot isolation only detects write-write conflicts:
        // this write makes a concurrent cast (which also writes the election
        // document) conflict with the delete instead of committing beside
        // it and orphaning its ballot.
        let touch = doc! {
            "$inc": {
                "revision": 1,
            }
        };
        let result = self
            .election_coll()
            .update_one_with_session(id.as_doc(), touch, None, &mut session)
            .await?;
        if result.matched_count != 1 {
            session.abort_transaction().await?;
            return Ok(false);
        }
        let ballots = self
            .ballot_coll()
            .count_documents_with_session(doc! {"election_id": *id}, None, &mut session)
            .await?;
        if ballots > 0 {
            session.abort_transaction().await?;
            return Err(StoreError::ConditionFailed);
        }
        let result = self
            .election_coll()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        if result.deleted_count != 1 {
            session.abort_transaction().await?;
            return Ok(false);
        }
        self.new_audit_coll()
            .insert_one_with_session(&audit, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(true)
    }

    async fn insert_ballot(
        &self,
        ballot: &Ballot,
        audit: NewAuditEntry,
    ) -> Result<(), StoreError> {
        let mut session = self.transaction().await?;
        // Re-check the phase inside the transaction, and do it with a write:
        // snapshot isolation only detects write-write conflicts, so a plain
        // read would let a concurrent pause or end commit alongside this
        // cast. Bumping the revision counter makes the two transactions
        // collide on the election document instead.
        let filter = doc! {
            "_id": *ballot.election_id,
            "phase": ElectionPhase::Active,
        };
        let touch = doc! {
            "$inc": {
                "revision": 1,
            }
        };
        let result = self
            .election_coll()
            .update_one_with_session(filter, touch, None, &mut session)
            .await?;
        if result.modified_count != 1 {
            session.abort_transaction().await?;
            return Err(StoreError::ConditionFailed);
        }

        let result = self
            .ballot_coll()
            .insert_one_with_session(ballot, None, &mut session)
            .await;
        if is_duplicate_key_error(result.as_ref()) {
            session.abort_transaction().await?;
            return Err(StoreError::Duplicate);
        }
        result?;

        self.new_audit_coll()
            .insert_one_with_session(&audit, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(())
    }

    async fn ballot_count(&self, election_id: Id) -> Result<u64, StoreError> {
        Ok(self
            .ballot_coll()
            .count_documents(doc! {"election_id": *election_id}, None)
            .await?)
    }

    async fn candidate_counts(&self, election_id: Id) -> Result<HashMap<Id, u64>, StoreError> {
        /// One row of the grouped aggregation.
        #[derive(Deserialize)]
        struct CandidateCount {
            #[serde(rename = "_id")]
            candidate_id: Id,
            count: i64,
        }

        let pipeline = vec![
            doc! {"$match": {"election_id": *election_id}},
            doc! {"$group": {"_id": "$candidate_id", "count": {"$sum": 1}}},
        ];
        let mut cursor = self.ballot_coll().aggregate(pipeline, None).await?;
        let mut counts = HashMap::new();
        while let Some(document) = cursor.try_next().await? {
            let row: CandidateCount =
                bson::from_document(document).map_err(DbError::from)?;
            counts.insert(row.candidate_id, row.count as u64);
        }
        Ok(counts)
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), StoreError> {
        self.new_audit_coll().insert_one(entry, None).await?;
        Ok(())
    }

    async fn audit_log(
        &self,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<AuditEntry>, u64), StoreError> {
        let total = self.audit_coll().count_documents(None, None).await?;
        let options = FindOptions::builder()
            .sort(doc! {"timestamp": 1})
            .skip(skip)
            .limit(limit as i64)
            .build();
        let entries = self
            .audit_coll()
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok((entries, total))
    }
}
