use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A registered voter.
///
/// Voter records are written by the external biometric registration flow;
/// this backend only ever reads the eligibility flag, via
/// [`EligibilityProvider`](crate::identity::EligibilityProvider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// Whether registration verified this voter's identity.
    pub eligible: bool,
}
