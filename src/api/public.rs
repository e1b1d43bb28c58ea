use std::sync::Arc;

use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::identity::EligibilityProvider;
use crate::ledger::tally;
use crate::model::{
    api::{
        election::ElectionDescription,
        tally::{TallySnapshot, Turnout},
    },
    mongodb::Id,
};
use crate::store::LedgerStore;

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        election_detail,
        election_tally,
        election_turnout,
    ]
}

#[get("/elections")]
async fn list_elections(
    store: &State<Arc<dyn LedgerStore>>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let elections = store.elections().await.map_err(Error::from)?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
async fn election_detail(
    election_id: Id,
    store: &State<Arc<dyn LedgerStore>>,
) -> Result<Json<ElectionDescription>> {
    let election = store
        .election(election_id)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>/tally")]
async fn election_tally(
    election_id: Id,
    store: &State<Arc<dyn LedgerStore>>,
    eligibility: &State<Arc<dyn EligibilityProvider>>,
) -> Result<Json<TallySnapshot>> {
    let snapshot = tally::tally(
        store.inner().as_ref(),
        eligibility.inner().as_ref(),
        election_id,
    )
    .await?;
    Ok(Json(snapshot))
}

#[get("/elections/<election_id>/turnout")]
async fn election_turnout(
    election_id: Id,
    store: &State<Arc<dyn LedgerStore>>,
    eligibility: &State<Arc<dyn EligibilityProvider>>,
) -> Result<Json<Turnout>> {
    let turnout = tally::live_turnout(
        store.inner().as_ref(),
        eligibility.inner().as_ref(),
        election_id,
    )
    .await?;
    Ok(Json(turnout))
}
