use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Candidate, Election, ElectionId};
use crate::error::{ElectionError, Result};

/// Internally consistent copy of one election's current state.
///
/// Only active (non-deleted) candidates are carried, ordered by ascending id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSnapshot {
    pub election: Election,
    pub candidates: Vec<Candidate>,
}

impl ElectionSnapshot {
    /// Builds a snapshot, dropping soft-deleted candidates and rejecting
    /// duplicated ids or candidates that belong to another election.
    pub fn new(election: Election, candidates: Vec<Candidate>) -> Result<Self> {
        let election_id = election.id;
        let mut seen = BTreeSet::new();
        for candidate in &candidates {
            if candidate.election_id != election_id {
                return Err(inconsistent(
                    election_id,
                    format!(
                        "candidate {} belongs to election {}",
                        candidate.id, candidate.election_id
                    ),
                ));
            }
            if !seen.insert(candidate.id) {
                return Err(inconsistent(
                    election_id,
                    format!("candidate id {} appears more than once", candidate.id),
                ));
            }
        }

        let mut active: Vec<Candidate> = candidates.into_iter().filter(Candidate::is_active).collect();
        active.sort_by_key(|c| c.id);

        Ok(Self {
            election,
            candidates: active,
        })
    }

    pub fn election_id(&self) -> ElectionId {
        self.election.id
    }
}

fn inconsistent(election_id: ElectionId, reason: String) -> ElectionError {
    ElectionError::InconsistentSnapshot {
        election_id,
        reason,
    }
}
