use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::ElectionPhase,
    db::election::{Candidate, Election, ElectionMetadata},
    mongodb::Id,
};

/// An election specification, as submitted by an administrator when creating
/// or editing an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election title.
    pub title: String,
    /// Election description.
    pub description: String,
    /// Start of the voting window.
    pub start_time: DateTime<Utc>,
    /// End of the voting window.
    pub end_time: DateTime<Utc>,
    /// Candidate specifications.
    pub candidates: Vec<CandidateSpec>,
}

impl From<ElectionSpec> for Election {
    /// Turn a spec into a fresh `Scheduled` election, assigning IDs.
    fn from(spec: ElectionSpec) -> Self {
        Self {
            id: Id::new(),
            metadata: ElectionMetadata {
                title: spec.title,
                description: spec.description,
                phase: ElectionPhase::Scheduled,
                results_published: false,
                start_time: spec.start_time,
                end_time: spec.end_time,
            },
            candidates: spec.candidates.into_iter().map(Candidate::from).collect(),
        }
    }
}

/// A candidate specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    /// Candidate name.
    pub name: String,
    /// Party affiliation, if any.
    pub party: Option<String>,
}

impl From<CandidateSpec> for Candidate {
    fn from(spec: CandidateSpec) -> Self {
        Self {
            id: Id::new(),
            name: spec.name,
            party: spec.party,
        }
    }
}

/// Client-facing view of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub phase: ElectionPhase,
    pub results_published: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub candidates: Vec<CandidateDescription>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            title: election.metadata.title,
            description: election.metadata.description,
            phase: election.metadata.phase,
            results_published: election.metadata.results_published,
            start_time: election.metadata.start_time,
            end_time: election.metadata.end_time,
            candidates: election
                .candidates
                .into_iter()
                .map(CandidateDescription::from)
                .collect(),
        }
    }
}

/// Client-facing view of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: Id,
    pub name: String,
    pub party: Option<String>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name,
            party: candidate.party,
        }
    }
}
