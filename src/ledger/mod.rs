//! The election lifecycle and ballot ledger core.
//!
//! Operations here take the store and collaborators as trait objects and are
//! exercised directly by the HTTP layer in `crate::api`.

pub mod closer;
pub mod elections;
pub mod receipt;
pub mod tally;
pub mod voting;
