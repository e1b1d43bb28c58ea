#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod notify;
pub mod scheduled_task;
pub mod store;

use config::{ConfigFairing, NotifierFairing, StoreFairing};
use ledger::closer::CloserFairing;
use logging::LoggerFairing;

/// Assemble the rocket. The closer fairing depends on the store fairing and
/// must come after it.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(NotifierFairing)
        .attach(CloserFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

/// A local client over a memory-backed rocket, plus direct access to the
/// store behind it.
#[cfg(test)]
pub(crate) async fn test_client() -> (
    rocket::local::asynchronous::Client,
    std::sync::Arc<store::MemoryStore>,
) {
    use std::sync::Arc;

    let store = Arc::new(store::MemoryStore::new());
    let closers = ledger::closer::ElectionClosers::new(store.clone() as Arc<dyn store::LedgerStore>);
    let rocket = rocket::build()
        .manage(config::Config::for_testing())
        .manage(store.clone() as Arc<dyn store::LedgerStore>)
        .manage(store.clone() as Arc<dyn identity::EligibilityProvider>)
        .manage(Arc::new(notify::NullNotifier) as Arc<dyn notify::Notifier>)
        .manage(closers)
        .mount("/", api::routes());
    let client = rocket::local::asynchronous::Client::tracked(rocket)
        .await
        .expect("failed to build test client");
    (client, store)
}
