//! Automatic closing of elections at the end of their voting window.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use mongodb::bson::doc;
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::error::Error;
use crate::model::{
    common::election::ElectionPhase,
    db::audit::{AuditAction, NewAuditEntry},
    mongodb::Id,
};
use crate::scheduled_task::ScheduledTask;
use crate::store::LedgerStore;

/// Map from election IDs to closer tasks.
type TaskMap = HashMap<Id, ScheduledTask<Result<(), Error>>>;

/// The actor name recorded on audit entries written by the closer.
const SYSTEM_ACTOR: &str = "system";

/// Scheduled tasks that move elections to `Ended` when their `end_time`
/// passes, so a forgotten election cannot accept ballots indefinitely.
pub struct ElectionClosers {
    store: Arc<dyn LedgerStore>,
    tasks: Arc<Mutex<TaskMap>>,
}

impl ElectionClosers {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            tasks: Default::default(),
        }
    }

    /// Schedule a closer for every election that is not yet `Ended`. Called
    /// once at startup, so elections whose windows elapsed while the service
    /// was down get closed immediately.
    pub async fn schedule_all(&self) -> Result<(), Error> {
        let elections = self.store.elections().await.map_err(Error::from)?;
        for election in elections {
            if !election.metadata.phase.is_terminal() {
                self.schedule(election.id, election.metadata.end_time).await;
            }
        }
        Ok(())
    }

    /// Schedule a closer for the given election at `end_time`. An existing
    /// closer for the same election is replaced, so rescheduling after an
    /// edit is the same call.
    pub async fn schedule(&self, election_id: Id, end_time: chrono::DateTime<Utc>) {
        let closer = Self::closer(election_id, self.store.clone(), self.tasks.clone());
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.remove(&election_id) {
            task.cancel().await;
        }
        tasks.insert(
            election_id,
            ScheduledTask::new(closer, end_time),
        );
    }

    /// Drop the closer for an election that no longer needs one, after a
    /// manual end or a deletion.
    pub async fn unschedule(&self, election_id: Id) {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.remove(&election_id) {
            task.cancel().await;
        }
    }

    /// Number of currently scheduled closers.
    #[cfg(test)]
    pub async fn scheduled_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// End the election if it is still open when the task fires.
    ///
    /// Recursive for the retry path, hence the `BoxFuture`.
    fn closer(
        election_id: Id,
        store: Arc<dyn LedgerStore>,
        tasks: Arc<Mutex<TaskMap>>,
    ) -> BoxFuture<'static, Result<(), Error>> {
        async fn close(election_id: Id, store: &dyn LedgerStore) -> Result<(), Error> {
            debug!("Running closer for election {election_id}");
            let election = match store.election(election_id).await? {
                Some(election) => election,
                // Deleted in the meantime; nothing to close.
                None => return Ok(()),
            };
            let from = election.metadata.phase;
            if !from.can_transition_to(ElectionPhase::Ended) {
                debug!("Closer for election {election_id} had nothing to do");
                return Ok(());
            }
            let audit = NewAuditEntry::new(
                SYSTEM_ACTOR,
                AuditAction::TransitionElection,
                doc! {
                    "election_id": *election_id,
                    "from": from,
                    "to": ElectionPhase::Ended,
                },
            );
            let ended = store
                .update_phase(election_id, from, ElectionPhase::Ended, audit)
                .await?;
            if ended {
                info!("Election {election_id} reached its end time and was closed");
            } else {
                // An administrator beat us to a transition; the conditional
                // write kept us from clobbering it.
                debug!("Closer for election {election_id} lost the phase race");
            }
            Ok(())
        }

        async move {
            let result = close(election_id, store.as_ref()).await;
            match result {
                Ok(()) => {
                    tasks.lock().await.remove(&election_id);
                }
                Err(ref e) => {
                    error!("Closer for election {election_id} failed: {e}");
                    const RETRY_INTERVAL_SECONDS: i64 = 300;
                    let retry = Self::closer(election_id, store, tasks.clone());
                    let retry_at = Utc::now() + Duration::seconds(RETRY_INTERVAL_SECONDS);
                    tasks.lock().await.insert(
                        election_id,
                        ScheduledTask::new(retry, retry_at),
                    );
                    warn!("Failed closer will be retried in {RETRY_INTERVAL_SECONDS} seconds");
                }
            }
            result
        }
        .boxed()
    }
}

/// Schedules closers for all open elections during ignition and places an
/// `ElectionClosers` into managed state. Must be attached after the fairing
/// that manages the store.
pub struct CloserFairing;

#[rocket::async_trait]
impl Fairing for CloserFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election Closers",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let store = match rocket.state::<Arc<dyn LedgerStore>>() {
            Some(store) => store.clone(),
            None => {
                error!("Store was not available when scheduling election closers");
                return Err(rocket);
            }
        };
        let closers = ElectionClosers::new(store);
        if let Err(e) = closers.schedule_all().await {
            error!("Failed to schedule election closers: {e}");
            return Err(rocket);
        }
        Ok(rocket.manage(closers))
    }
}

#[cfg(test)]
mod tests {
    use rocket::tokio;

    use crate::model::db::election::Election;
    use crate::store::MemoryStore;

    use super::*;

    async fn store_with(election: &Election) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let audit = NewAuditEntry::new("admin", AuditAction::CreateElection, doc! {});
        store.insert_election(election, audit).await.unwrap();
        store
    }

    #[rocket::async_test]
    async fn closes_an_election_past_its_end_time() {
        let mut election = Election::active_example();
        election.metadata.end_time = Utc::now() - Duration::minutes(1);
        let store = store_with(&election).await;

        let closers = ElectionClosers::new(store.clone());
        closers.schedule_all().await.unwrap();

        // The end time is in the past, so the closer fires immediately.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let stored = store.election(election.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.phase, ElectionPhase::Ended);
        assert_eq!(closers.scheduled_count().await, 0);
    }

    #[rocket::async_test]
    async fn leaves_already_ended_elections_alone() {
        let election = Election::ended_example();
        let store = store_with(&election).await;

        let closers = ElectionClosers::new(store.clone());
        closers.schedule_all().await.unwrap();
        assert_eq!(closers.scheduled_count().await, 0);
    }

    #[rocket::async_test]
    async fn reschedule_replaces_the_existing_task() {
        let election = Election::active_example();
        let store = store_with(&election).await;

        let closers = ElectionClosers::new(store.clone());
        closers.schedule(election.id, election.metadata.end_time).await;
        closers
            .schedule(election.id, election.metadata.end_time + Duration::hours(1))
            .await;
        assert_eq!(closers.scheduled_count().await, 1);

        closers.unschedule(election.id).await;
        assert_eq!(closers.scheduled_count().await, 0);
    }
}
