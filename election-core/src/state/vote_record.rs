use serde::{Deserialize, Serialize};

use super::{Address, CandidateId, ElectionId, EventOffset};

/// Proof that `voter` has voted in `election_id`. Never removed once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub election_id: ElectionId,
    pub voter: Address,
    pub candidate_id: CandidateId,
    pub offset: EventOffset,
    pub tx_hash: String,
}

/// Delegation recorded for audit; it has no effect on tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub election_id: ElectionId,
    pub from: Address,
    pub to: Address,
    pub offset: EventOffset,
}
