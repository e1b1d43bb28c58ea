use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{db::election::Election, mongodb::Id};

/// A point-in-time tally of an election, derived from the ballot ledger.
/// Never persisted: the ledger is the source of truth and this is recomputed
/// on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallySnapshot {
    pub election_id: Id,
    /// Per-candidate counts, including zero counts.
    pub candidates: Vec<CandidateTally>,
    /// Total ballots cast in this election.
    pub total_ballots: u64,
    /// Eligible voters at query time (the turnout denominator).
    pub eligible_voters: u64,
    /// `total_ballots / eligible_voters`, or zero with no eligible voters.
    pub turnout: f64,
}

impl TallySnapshot {
    /// Assemble a snapshot from grouped ballot counts. Candidates without
    /// ballots appear with a zero count.
    pub fn new(election: &Election, counts: HashMap<Id, u64>, eligible_voters: u64) -> Self {
        let candidates: Vec<CandidateTally> = election
            .candidates
            .iter()
            .map(|candidate| CandidateTally {
                candidate_id: candidate.id,
                name: candidate.name.clone(),
                party: candidate.party.clone(),
                votes: counts.get(&candidate.id).copied().unwrap_or(0),
            })
            .collect();
        let total_ballots = candidates.iter().map(|c| c.votes).sum();
        let turnout = if eligible_voters == 0 {
            0.0
        } else {
            total_ballots as f64 / eligible_voters as f64
        };

        Self {
            election_id: election.id,
            candidates,
            total_ballots,
            eligible_voters,
            turnout,
        }
    }
}

/// Turnout figures alone, for the live dashboard: per-candidate counts are
/// withheld while voting is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turnout {
    pub election_id: Id,
    pub total_ballots: u64,
    pub eligible_voters: u64,
    pub turnout: f64,
}

impl From<TallySnapshot> for Turnout {
    fn from(snapshot: TallySnapshot) -> Self {
        Self {
            election_id: snapshot.election_id,
            total_ballots: snapshot.total_ballots,
            eligible_voters: snapshot.eligible_voters,
            turnout: snapshot.turnout,
        }
    }
}

/// One candidate's share of the tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidate_id: Id,
    pub name: String,
    pub party: Option<String>,
    pub votes: u64,
}
