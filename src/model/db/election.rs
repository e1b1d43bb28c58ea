use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionPhase, mongodb::Id};

/// Core election data, as stored in the database.
///
/// Candidates are embedded: a candidate belongs to exactly one election, and
/// lives and dies with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// Top-level metadata.
    #[serde(flatten)]
    pub metadata: ElectionMetadata,
    /// Candidates standing in this election.
    pub candidates: Vec<Candidate>,
}

impl Election {
    /// Look up a candidate by ID.
    pub fn candidate(&self, candidate_id: Id) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Is this election accepting ballots at the given instant?
    /// Requires the `Active` phase and the instant to lie within
    /// `[start_time, end_time)`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.metadata.phase == ElectionPhase::Active
            && now >= self.metadata.start_time
            && now < self.metadata.end_time
    }

    /// May an administrator still edit this election?
    pub fn is_editable(&self) -> bool {
        matches!(
            self.metadata.phase,
            ElectionPhase::Draft | ElectionPhase::Scheduled
        )
    }
}

/// A view on just the election's top-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionMetadata {
    /// Election title.
    pub title: String,
    /// Election description.
    pub description: String,
    /// Lifecycle phase.
    pub phase: ElectionPhase,
    /// Whether the final tally has been made public.
    /// Can only become true once the phase is `Ended`, and never reverts.
    pub results_published: bool,
    /// Start of the voting window.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// End of the voting window.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
}

/// A candidate standing in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique ID.
    pub id: Id,
    /// Candidate name.
    pub name: String,
    /// Party affiliation, if any.
    pub party: Option<String>,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl Election {
        /// An election currently inside its voting window, in the given phase.
        pub fn example_in_phase(phase: ElectionPhase) -> Self {
            let now = Utc::now();
            Self {
                id: Id::new(),
                metadata: ElectionMetadata {
                    title: "Student Union President".to_string(),
                    description: "Annual presidential election".to_string(),
                    phase,
                    results_published: false,
                    start_time: now - Duration::hours(1),
                    end_time: now + Duration::hours(1),
                },
                candidates: vec![Candidate::example1(), Candidate::example2()],
            }
        }

        pub fn active_example() -> Self {
            Self::example_in_phase(ElectionPhase::Active)
        }

        pub fn scheduled_example() -> Self {
            let mut example = Self::example_in_phase(ElectionPhase::Scheduled);
            example.metadata.start_time = Utc::now() + Duration::hours(1);
            example.metadata.end_time = Utc::now() + Duration::hours(2);
            example
        }

        pub fn ended_example() -> Self {
            let mut example = Self::example_in_phase(ElectionPhase::Ended);
            example.metadata.start_time = Utc::now() - Duration::hours(2);
            example.metadata.end_time = Utc::now() - Duration::hours(1);
            example
        }
    }

    impl Candidate {
        pub fn example1() -> Self {
            Self {
                id: Id::new(),
                name: "Alice Appleby".to_string(),
                party: Some("Apple Party".to_string()),
            }
        }

        pub fn example2() -> Self {
            Self {
                id: Id::new(),
                name: "Bob Birch".to_string(),
                party: None,
            }
        }
    }
}
