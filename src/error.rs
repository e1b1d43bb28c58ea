use std::fmt::Display;

use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::common::election::ElectionPhase;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong with a ledger operation.
///
/// Errors are values returned to the caller, never used for control flow.
/// Only `StoreUnavailable` and `ConcurrentConflict` are retryable; every
/// other kind is terminal for the request and surfaced verbatim.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition {
        from: ElectionPhase,
        to: ElectionPhase,
    },
    #[error("Current time is outside the election's voting window")]
    OutsideWindow,
    #[error("Election can no longer be edited")]
    LockedForEditing,
    #[error("Election still has ballots and cannot be deleted")]
    HasBallots,
    #[error("Election is not open for voting")]
    ElectionNotActive,
    #[error("No such candidate in this election")]
    UnknownCandidate,
    #[error("Voter is not eligible to vote")]
    NotEligible,
    #[error("Voter has already cast a ballot in this election")]
    AlreadyVoted,
    #[error("Lost a race on a conditional write; retry with fresh state")]
    ConcurrentConflict,
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] mongodb::error::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl From<StoreError> for Error {
    /// The context-free translation. Call sites that can attach meaning to a
    /// rejected write (`AlreadyVoted`, `HasBallots`, ...) must match those
    /// variants before falling back to this.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate | StoreError::ConditionFailed => Error::ConcurrentConflict,
            StoreError::Unavailable(e) => Error::StoreUnavailable(e),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        match self {
            Self::StoreUnavailable(_) => error!("{self}"),
            _ => warn!("{self}"),
        }
        Err(match self {
            Self::InvalidSchedule(_)
            | Self::IllegalTransition { .. }
            | Self::OutsideWindow
            | Self::LockedForEditing
            | Self::HasBallots
            | Self::ElectionNotActive
            | Self::UnknownCandidate => Status::BadRequest,
            Self::NotEligible => Status::Forbidden,
            Self::AlreadyVoted | Self::ConcurrentConflict => Status::Conflict,
            Self::StoreUnavailable(_) => Status::ServiceUnavailable,
            Self::NotFound(_) => Status::NotFound,
        })
    }
}
