use serde::{Deserialize, Serialize};

use super::{CandidateId, ElectionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub election_id: ElectionId,
    pub name: String,
    pub party: String,
    pub metadata_uri: String,
    pub vote_count: u64,
    /// Soft-delete flag. Deleted candidates stay addressable by id but never
    /// count towards listings, tallies or the winner.
    pub is_deleted: bool,
}

impl Candidate {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}
