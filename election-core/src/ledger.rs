//! Boundary to the external election ledger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::{
    Address, Candidate, CandidateId, ElectionId, EventOffset, LedgerEvent, Timestamp,
};

/// Raw election parameters as stored on the ledger. Unset dates read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionParams {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub is_paused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub name: String,
    pub party: String,
    pub vote_count: u64,
    pub uri: String,
    pub is_deleted: bool,
}

impl CandidateRecord {
    pub fn into_candidate(self, election_id: ElectionId, id: CandidateId) -> Candidate {
        Candidate {
            id,
            election_id,
            name: self.name,
            party: self.party,
            metadata_uri: self.uri,
            vote_count: self.vote_count,
            is_deleted: self.is_deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCandidate {
    pub name: String,
    pub party: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

/// Read and write surface of the election contract.
///
/// Reads fail with `LedgerUnavailable`. Writes are signed on behalf of
/// `actor` and fail with `WriteRejected` when the contract reverts.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current contract owner, the only account allowed to administer elections.
    async fn get_owner(&self) -> Result<Address>;

    async fn get_election(&self, election_id: ElectionId) -> Result<ElectionParams>;

    /// Highest candidate id issued so far. Ids run `1..=count` and include deleted ones.
    async fn get_active_candidate_count(&self, election_id: ElectionId) -> Result<u64>;

    async fn get_candidate(&self, election_id: ElectionId, id: CandidateId) -> Result<CandidateRecord>;

    async fn check_voted(&self, election_id: ElectionId, actor: &Address) -> Result<bool>;

    async fn submit_vote(
        &self,
        election_id: ElectionId,
        actor: &Address,
        candidate_id: CandidateId,
    ) -> Result<TxReceipt>;

    async fn submit_add_candidate(
        &self,
        election_id: ElectionId,
        actor: &Address,
        candidate: NewCandidate,
    ) -> Result<TxReceipt>;

    async fn submit_delete_candidate(
        &self,
        election_id: ElectionId,
        actor: &Address,
        candidate_id: CandidateId,
    ) -> Result<TxReceipt>;

    async fn submit_set_dates(
        &self,
        election_id: ElectionId,
        actor: &Address,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<TxReceipt>;

    async fn submit_toggle_pause(&self, election_id: ElectionId, actor: &Address) -> Result<TxReceipt>;

    /// Events strictly after `cursor` in `(block_number, log_index)` order, at most `limit`.
    async fn events_after(&self, cursor: Option<EventOffset>, limit: usize) -> Result<Vec<LedgerEvent>>;
}
