//! Administrator operations on the election lifecycle.
//!
//! Each operation validates against the current phase, then commits through a
//! single conditional write on the store, so two concurrent administrators
//! resolve to one winner and one structured error rather than corrupt state.

use chrono::Utc;
use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    api::election::ElectionSpec,
    common::election::ElectionPhase,
    db::{
        audit::{AuditAction, NewAuditEntry},
        election::Election,
    },
    mongodb::Id,
};
use crate::store::{LedgerStore, PublishOutcome, StoreError};

/// Create a new election in `Scheduled` from the given spec.
pub async fn create_election(
    store: &dyn LedgerStore,
    actor: &str,
    spec: ElectionSpec,
) -> Result<Election> {
    validate_spec(&spec)?;
    if spec.start_time <= Utc::now() {
        return Err(Error::InvalidSchedule(
            "start time must be in the future".to_string(),
        ));
    }

    let election = Election::from(spec);
    let audit = NewAuditEntry::new(
        actor,
        AuditAction::CreateElection,
        doc! {
            "election_id": *election.id,
            "title": &election.metadata.title,
        },
    );
    store.insert_election(&election, audit).await?;
    Ok(election)
}

/// Replace an election's details and candidates from a new spec.
///
/// Only `Draft` and `Scheduled` elections may be edited; candidates are
/// re-issued fresh IDs since no ballot can reference them yet.
pub async fn edit_election(
    store: &dyn LedgerStore,
    actor: &str,
    election_id: Id,
    spec: ElectionSpec,
) -> Result<Election> {
    validate_spec(&spec)?;

    let existing = store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    if !existing.is_editable() {
        return Err(Error::LockedForEditing);
    }

    let mut updated = Election::from(spec);
    updated.id = election_id;
    updated.metadata.phase = existing.metadata.phase;

    let audit = NewAuditEntry::new(
        actor,
        AuditAction::EditElection,
        doc! {
            "election_id": *election_id,
            "title": &updated.metadata.title,
        },
    );
    if store.replace_election(&updated, audit).await? {
        return Ok(updated);
    }
    // The guarded write lost a race; report what the store looks like now.
    match store.election(election_id).await? {
        None => Err(Error::not_found(format!("Election {}", election_id))),
        Some(election) if !election.is_editable() => Err(Error::LockedForEditing),
        Some(_) => Err(Error::ConcurrentConflict),
    }
}

/// Move an election to `target`, validating the edge and, for activation,
/// the voting window.
pub async fn transition_election(
    store: &dyn LedgerStore,
    actor: &str,
    election_id: Id,
    target: ElectionPhase,
) -> Result<Election> {
    let election = store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    let from = election.metadata.phase;

    if !from.can_transition_to(target) {
        return Err(Error::IllegalTransition { from, to: target });
    }
    if target == ElectionPhase::Active {
        let now = Utc::now();
        if now < election.metadata.start_time || now >= election.metadata.end_time {
            return Err(Error::OutsideWindow);
        }
    }

    let audit = NewAuditEntry::new(
        actor,
        AuditAction::TransitionElection,
        doc! {
            "election_id": *election_id,
            "from": from,
            "to": target,
        },
    );
    if !store.update_phase(election_id, from, target, audit).await? {
        // A concurrent transition changed the phase between our read and the
        // conditional write.
        return Err(Error::ConcurrentConflict);
    }

    let mut election = election;
    election.metadata.phase = target;
    Ok(election)
}

/// Publish the results of an `Ended` election.
///
/// Idempotent: re-publishing is a no-op success and appends no further audit
/// entry. Returns true iff the flag was flipped by this call.
pub async fn publish_results(
    store: &dyn LedgerStore,
    actor: &str,
    election_id: Id,
) -> Result<bool> {
    let audit = NewAuditEntry::new(
        actor,
        AuditAction::PublishResults,
        doc! {
            "election_id": *election_id,
        },
    );
    match store.publish_results(election_id, audit).await? {
        PublishOutcome::Published => Ok(true),
        PublishOutcome::AlreadyPublished => Ok(false),
        PublishOutcome::NotFound => Err(Error::not_found(format!("Election {}", election_id))),
        PublishOutcome::NotEnded => {
            let from = store
                .election(election_id)
                .await?
                .map(|e| e.metadata.phase)
                .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
            Err(Error::IllegalTransition {
                from,
                to: ElectionPhase::Ended,
            })
        }
    }
}

/// Delete an election and its candidates, provided no ballot references it.
pub async fn delete_election(
    store: &dyn LedgerStore,
    actor: &str,
    election_id: Id,
) -> Result<()> {
    let audit = NewAuditEntry::new(
        actor,
        AuditAction::DeleteElection,
        doc! {
            "election_id": *election_id,
        },
    );
    match store.delete_election(election_id, audit).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::not_found(format!("Election {}", election_id))),
        Err(StoreError::ConditionFailed) => Err(Error::HasBallots),
        Err(err) => Err(err.into()),
    }
}

fn validate_spec(spec: &ElectionSpec) -> Result<()> {
    if spec.start_time >= spec.end_time {
        return Err(Error::InvalidSchedule(
            "start time must be before end time".to_string(),
        ));
    }
    if spec.end_time <= Utc::now() {
        return Err(Error::InvalidSchedule(
            "end time must be in the future".to_string(),
        ));
    }
    if spec.candidates.is_empty() {
        return Err(Error::InvalidSchedule(
            "an election needs at least one candidate".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::model::db::ballot::Ballot;
    use crate::store::MemoryStore;

    use super::*;

    #[rocket::async_test]
    async fn create_lands_in_scheduled_with_audit() {
        let store = MemoryStore::new();
        let election = create_election(&store, "admin", ElectionSpec::future_example())
            .await
            .unwrap();
        assert_eq!(election.metadata.phase, ElectionPhase::Scheduled);
        assert!(!election.metadata.results_published);

        let (entries, total) = store.audit_log(0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(entries[0].entry.action, AuditAction::CreateElection);
        assert_eq!(entries[0].entry.actor, "admin");
    }

    #[rocket::async_test]
    async fn create_rejects_started_window() {
        let store = MemoryStore::new();
        let result = create_election(&store, "admin", ElectionSpec::started_example()).await;
        assert!(matches!(result, Err(Error::InvalidSchedule(_))));
        assert!(store.elections().await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn create_rejects_inverted_window() {
        let store = MemoryStore::new();
        let mut spec = ElectionSpec::future_example();
        std::mem::swap(&mut spec.start_time, &mut spec.end_time);
        let result = create_election(&store, "admin", spec).await;
        assert!(matches!(result, Err(Error::InvalidSchedule(_))));
    }

    #[rocket::async_test]
    async fn edit_allowed_only_before_activation() {
        let store = MemoryStore::new();
        let election = create_election(&store, "admin", ElectionSpec::future_example())
            .await
            .unwrap();

        let mut spec = ElectionSpec::future_example();
        spec.title = "Renamed".to_string();
        let updated = edit_election(&store, "admin", election.id, spec.clone())
            .await
            .unwrap();
        assert_eq!(updated.metadata.title, "Renamed");

        // Force activation, after which edits are refused.
        let audit = NewAuditEntry::new("admin", AuditAction::TransitionElection, doc! {});
        store
            .update_phase(
                election.id,
                ElectionPhase::Scheduled,
                ElectionPhase::Active,
                audit,
            )
            .await
            .unwrap();
        assert!(matches!(
            edit_election(&store, "admin", election.id, spec).await,
            Err(Error::LockedForEditing)
        ));
    }

    #[rocket::async_test]
    async fn illegal_transitions_name_both_phases() {
        let store = MemoryStore::new();
        let election = create_election(&store, "admin", ElectionSpec::future_example())
            .await
            .unwrap();

        let result =
            transition_election(&store, "admin", election.id, ElectionPhase::Paused).await;
        match result {
            Err(Error::IllegalTransition { from, to }) => {
                assert_eq!(from, ElectionPhase::Scheduled);
                assert_eq!(to, ElectionPhase::Paused);
            }
            other => panic!("expected IllegalTransition, got {:?}", other.map(|e| e.id)),
        }
    }

    #[rocket::async_test]
    async fn activation_outside_window_is_rejected() {
        let store = MemoryStore::new();
        // Window starts in an hour; activating now must fail.
        let election = create_election(&store, "admin", ElectionSpec::future_example())
            .await
            .unwrap();
        assert!(matches!(
            transition_election(&store, "admin", election.id, ElectionPhase::Active).await,
            Err(Error::OutsideWindow)
        ));
    }

    #[rocket::async_test]
    async fn full_lifecycle_to_ended() {
        let store = MemoryStore::new();
        let mut spec = ElectionSpec::future_example();
        spec.start_time = Utc::now() + Duration::milliseconds(100);
        spec.end_time = Utc::now() + Duration::hours(1);
        let election = create_election(&store, "admin", spec).await.unwrap();

        rocket::tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        transition_election(&store, "admin", election.id, ElectionPhase::Active)
            .await
            .unwrap();
        transition_election(&store, "admin", election.id, ElectionPhase::Paused)
            .await
            .unwrap();
        transition_election(&store, "admin", election.id, ElectionPhase::Active)
            .await
            .unwrap();
        let ended = transition_election(&store, "admin", election.id, ElectionPhase::Ended)
            .await
            .unwrap();
        assert_eq!(ended.metadata.phase, ElectionPhase::Ended);

        // Ended is terminal.
        assert!(matches!(
            transition_election(&store, "admin", election.id, ElectionPhase::Active).await,
            Err(Error::IllegalTransition { .. })
        ));
    }

    #[rocket::async_test]
    async fn publish_is_idempotent_with_one_audit_entry() {
        let store = MemoryStore::new();
        let election = Election::ended_example();
        let audit = NewAuditEntry::new("admin", AuditAction::CreateElection, doc! {});
        store.insert_election(&election, audit).await.unwrap();

        assert!(publish_results(&store, "admin", election.id).await.unwrap());
        assert!(!publish_results(&store, "admin", election.id).await.unwrap());

        let stored = store.election(election.id).await.unwrap().unwrap();
        assert!(stored.metadata.results_published);

        let (entries, _) = store.audit_log(0, 100).await.unwrap();
        let publishes = entries
            .iter()
            .filter(|e| e.entry.action == AuditAction::PublishResults)
            .count();
        assert_eq!(publishes, 1);
    }

    #[rocket::async_test]
    async fn publish_before_ended_is_illegal() {
        let store = MemoryStore::new();
        let election = create_election(&store, "admin", ElectionSpec::future_example())
            .await
            .unwrap();
        assert!(matches!(
            publish_results(&store, "admin", election.id).await,
            Err(Error::IllegalTransition {
                from: ElectionPhase::Scheduled,
                to: ElectionPhase::Ended,
            })
        ));
    }

    #[rocket::async_test]
    async fn delete_refused_with_ballots() {
        let store = MemoryStore::new();
        let election = Election::active_example();
        let audit = NewAuditEntry::new("admin", AuditAction::CreateElection, doc! {});
        store.insert_election(&election, audit).await.unwrap();
        for _ in 0..3 {
            let ballot = Ballot::new(
                election.id,
                Id::new(),
                election.candidates[0].id,
                "r".to_string(),
            );
            let audit = NewAuditEntry::new("voter", AuditAction::CastBallot, doc! {});
            store.insert_ballot(&ballot, audit).await.unwrap();
        }

        assert!(matches!(
            delete_election(&store, "admin", election.id).await,
            Err(Error::HasBallots)
        ));
        assert!(store.election(election.id).await.unwrap().is_some());
    }

    #[rocket::async_test]
    async fn delete_without_ballots_succeeds() {
        let store = MemoryStore::new();
        let election = create_election(&store, "admin", ElectionSpec::future_example())
            .await
            .unwrap();
        delete_election(&store, "admin", election.id).await.unwrap();
        assert!(store.election(election.id).await.unwrap().is_none());
        assert!(matches!(
            delete_election(&store, "admin", election.id).await,
            Err(Error::NotFound(_))
        ));
    }
}
