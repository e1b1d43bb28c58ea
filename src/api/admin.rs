use std::sync::Arc;

use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ledger::{closer::ElectionClosers, elections};
use crate::model::{
    api::{
        audit::AuditEntryDescription,
        election::{ElectionDescription, ElectionSpec},
    },
    common::election::ElectionPhase,
    db::audit::{AuditAction, NewAuditEntry},
    mongodb::Id,
    pagination::{Pagination, PaginationResult},
};
use crate::notify::Notifier;
use crate::store::LedgerStore;

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        edit_election,
        transition_election,
        publish_results,
        delete_election,
        audit_log,
        send_announcement,
    ]
}

/// An election spec plus the administrator submitting it.
#[derive(Debug, Deserialize)]
struct ElectionRequest {
    actor: String,
    #[serde(flatten)]
    spec: ElectionSpec,
}

#[post("/admin/elections", data = "<request>", format = "json")]
async fn create_election(
    request: Json<ElectionRequest>,
    store: &State<Arc<dyn LedgerStore>>,
    closers: &State<ElectionClosers>,
) -> Result<Json<ElectionDescription>> {
    let request = request.into_inner();
    let election =
        elections::create_election(store.inner().as_ref(), &request.actor, request.spec).await?;
    closers
        .schedule(election.id, election.metadata.end_time)
        .await;
    Ok(Json(election.into()))
}

#[put("/admin/elections/<election_id>", data = "<request>", format = "json")]
async fn edit_election(
    election_id: Id,
    request: Json<ElectionRequest>,
    store: &State<Arc<dyn LedgerStore>>,
    closers: &State<ElectionClosers>,
) -> Result<Json<ElectionDescription>> {
    let request = request.into_inner();
    let election = elections::edit_election(
        store.inner().as_ref(),
        &request.actor,
        election_id,
        request.spec,
    )
    .await?;
    // The end time may have moved; the closer follows it.
    closers
        .schedule(election.id, election.metadata.end_time)
        .await;
    Ok(Json(election.into()))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    actor: String,
    target: ElectionPhase,
}

#[post(
    "/admin/elections/<election_id>/transition",
    data = "<request>",
    format = "json"
)]
async fn transition_election(
    election_id: Id,
    request: Json<TransitionRequest>,
    store: &State<Arc<dyn LedgerStore>>,
    closers: &State<ElectionClosers>,
) -> Result<Json<ElectionDescription>> {
    let election = elections::transition_election(
        store.inner().as_ref(),
        &request.actor,
        election_id,
        request.target,
    )
    .await?;
    if request.target.is_terminal() {
        closers.unschedule(election_id).await;
    }
    Ok(Json(election.into()))
}

#[derive(Debug, Deserialize)]
struct ActorRequest {
    actor: String,
}

#[post(
    "/admin/elections/<election_id>/results",
    data = "<request>",
    format = "json"
)]
async fn publish_results(
    election_id: Id,
    request: Json<ActorRequest>,
    store: &State<Arc<dyn LedgerStore>>,
    notifier: &State<Arc<dyn Notifier>>,
) -> Result<()> {
    let newly_published =
        elections::publish_results(store.inner().as_ref(), &request.actor, election_id).await?;
    if newly_published {
        if let Some(election) = store.election(election_id).await.map_err(Error::from)? {
            notifier
                .broadcast(
                    &format!("Results published: {}", election.metadata.title),
                    &format!(
                        "The results of the election '{}' are now available.",
                        election.metadata.title
                    ),
                )
                .await;
        }
    }
    Ok(())
}

#[delete("/admin/elections/<election_id>?<actor>")]
async fn delete_election(
    election_id: Id,
    actor: String,
    store: &State<Arc<dyn LedgerStore>>,
    closers: &State<ElectionClosers>,
) -> Result<()> {
    elections::delete_election(store.inner().as_ref(), &actor, election_id).await?;
    closers.unschedule(election_id).await;
    Ok(())
}

/// One page of the audit log.
#[derive(Debug, serde::Serialize)]
struct AuditLogPage {
    entries: Vec<AuditEntryDescription>,
    pagination: PaginationResult,
}

#[get("/admin/audit")]
async fn audit_log(
    pagination: Pagination,
    store: &State<Arc<dyn LedgerStore>>,
) -> Result<Json<AuditLogPage>> {
    let (entries, total) = store
        .audit_log(pagination.skip(), pagination.page_size() as u64)
        .await
        .map_err(Error::from)?;
    Ok(Json(AuditLogPage {
        entries: entries.into_iter().map(Into::into).collect(),
        pagination: pagination.result(total as usize),
    }))
}

#[derive(Debug, Deserialize)]
struct Announcement {
    actor: String,
    subject: String,
    body: String,
}

#[post("/admin/announcements", data = "<request>", format = "json")]
async fn send_announcement(
    request: Json<Announcement>,
    store: &State<Arc<dyn LedgerStore>>,
    notifier: &State<Arc<dyn Notifier>>,
) -> Result<()> {
    let request = request.into_inner();
    // Audited first: if the audit write fails, nothing goes out.
    let audit = NewAuditEntry::new(
        &request.actor,
        AuditAction::SendAnnouncement,
        doc! {"subject": &request.subject},
    );
    store.append_audit(audit).await.map_err(Error::from)?;
    notifier.broadcast(&request.subject, &request.body).await;
    Ok(())
}
