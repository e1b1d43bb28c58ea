//! The HTTP surface, a thin layer over `crate::ledger`.

use rocket::Route;

mod admin;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    [admin::routes(), public::routes(), voting::routes()].concat()
}
