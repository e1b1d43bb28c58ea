use std::sync::Arc;

use rocket::{serde::json::Json, Route, State};
use serde::Deserialize;

use crate::config::Config;
use crate::error::Result;
use crate::identity::EligibilityProvider;
use crate::ledger::voting::cast_ballot;
use crate::model::{api::ballot::BallotReceipt, mongodb::Id};
use crate::store::LedgerStore;

pub fn routes() -> Vec<Route> {
    routes![cast]
}

#[derive(Debug, Deserialize)]
struct CastRequest {
    voter_id: Id,
    candidate_id: Id,
}

#[post("/elections/<election_id>/ballots", data = "<request>", format = "json")]
async fn cast(
    election_id: Id,
    request: Json<CastRequest>,
    store: &State<Arc<dyn LedgerStore>>,
    eligibility: &State<Arc<dyn EligibilityProvider>>,
    config: &State<Config>,
) -> Result<Json<BallotReceipt>> {
    let ballot = cast_ballot(
        store.inner().as_ref(),
        eligibility.inner().as_ref(),
        config.receipt_secret(),
        election_id,
        request.voter_id,
        request.candidate_id,
    )
    .await?;
    Ok(Json(BallotReceipt::from(ballot)))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    use crate::api::admin::tests::{active_election, create_election};
    use crate::model::{api::election::ElectionSpec, common::election::ElectionPhase};
    use crate::test_client;

    use super::*;

    #[rocket::async_test]
    async fn cast_returns_a_receipt() {
        let (client, store) = test_client().await;
        let election = active_election(&store).await;
        let voter = Id::new();
        store.register_voter(voter, true);

        let response = client
            .post(format!("/elections/{}/ballots", election.id))
            .header(ContentType::JSON)
            .body(
                json!({
                    "voter_id": voter,
                    "candidate_id": election.candidates[0].id,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let receipt: BallotReceipt = response.into_json().await.unwrap();
        assert_eq!(receipt.election_id, election.id);
        assert!(!receipt.receipt.is_empty());
    }

    #[rocket::async_test]
    async fn retrying_a_cast_conflicts() {
        let (client, store) = test_client().await;
        let election = active_election(&store).await;
        let voter = Id::new();
        store.register_voter(voter, true);
        let body = json!({
            "voter_id": voter,
            "candidate_id": election.candidates[0].id,
        })
        .to_string();

        let first = client
            .post(format!("/elections/{}/ballots", election.id))
            .header(ContentType::JSON)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(first.status(), Status::Ok);

        // A network-level retry of the same request must not double count.
        let second = client
            .post(format!("/elections/{}/ballots", election.id))
            .header(ContentType::JSON)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(second.status(), Status::Conflict);
        assert_eq!(store.ballot_count(election.id).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn ineligible_voter_is_forbidden() {
        let (client, store) = test_client().await;
        let election = active_election(&store).await;

        let response = client
            .post(format!("/elections/{}/ballots", election.id))
            .header(ContentType::JSON)
            .body(
                json!({
                    "voter_id": Id::new(),
                    "candidate_id": election.candidates[0].id,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn casting_into_scheduled_election_is_rejected() {
        let (client, store) = test_client().await;
        let election = create_election(&client, ElectionSpec::future_example()).await;
        assert_eq!(election.phase, ElectionPhase::Scheduled);
        let voter = Id::new();
        store.register_voter(voter, true);

        let response = client
            .post(format!("/elections/{}/ballots", election.id))
            .header(ContentType::JSON)
            .body(
                json!({
                    "voter_id": voter,
                    "candidate_id": election.candidates[0].id,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
