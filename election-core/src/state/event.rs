use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Address, CandidateId, ElectionId, Timestamp};
use crate::error::{ElectionError, Result};

/// Position of an event in the ledger log. Ordered by block, then log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventOffset {
    pub block_number: u64,
    pub log_index: u64,
}

impl EventOffset {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for EventOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// Raw event as delivered by the ledger's ordered event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub kind: String,
    pub payload: Value,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
}

impl LedgerEvent {
    pub fn offset(&self) -> EventOffset {
        EventOffset::new(self.block_number, self.log_index)
    }

    /// Election the event belongs to, read from the raw payload so that
    /// events which fail to decode can still be routed. Contract-wide events
    /// carry none.
    pub fn routed_election_id(&self) -> Option<ElectionId> {
        self.payload.get("election_id").and_then(Value::as_u64)
    }

    /// Interprets the raw kind and payload.
    pub fn decode(&self) -> Result<ElectionEvent> {
        serde_json::from_value(json!({ "kind": self.kind, "payload": self.payload })).map_err(
            |e| ElectionError::MalformedEvent {
                offset: self.offset(),
                reason: format!("cannot decode {} event: {}", self.kind, e),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAdded {
    pub election_id: ElectionId,
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    #[serde(default)]
    pub metadata_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDeleted {
    pub election_id: ElectionId,
    pub id: CandidateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voted {
    pub election_id: ElectionId,
    pub voter: Address,
    pub candidate_id: CandidateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paused {
    pub election_id: ElectionId,
    pub is_paused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingDatesSet {
    pub election_id: ElectionId,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegated {
    pub election_id: ElectionId,
    pub from: Address,
    pub to: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipChange {
    pub previous_owner: Address,
    pub new_owner: Address,
}

/// Decoded ledger event. Each variant maps to exactly one projection mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum ElectionEvent {
    CandidateAdded(CandidateAdded),
    CandidateDeleted(CandidateDeleted),
    Voted(Voted),
    Paused(Paused),
    VotingDatesSet(VotingDatesSet),
    Delegated(Delegated),
    OwnershipTransferStarted(OwnershipChange),
    OwnershipTransferred(OwnershipChange),
}

impl ElectionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ElectionEvent::CandidateAdded(_) => "CandidateAdded",
            ElectionEvent::CandidateDeleted(_) => "CandidateDeleted",
            ElectionEvent::Voted(_) => "Voted",
            ElectionEvent::Paused(_) => "Paused",
            ElectionEvent::VotingDatesSet(_) => "VotingDatesSet",
            ElectionEvent::Delegated(_) => "Delegated",
            ElectionEvent::OwnershipTransferStarted(_) => "OwnershipTransferStarted",
            ElectionEvent::OwnershipTransferred(_) => "OwnershipTransferred",
        }
    }

    /// Election the event belongs to. Ownership events are contract-wide.
    pub fn election_id(&self) -> Option<ElectionId> {
        match self {
            ElectionEvent::CandidateAdded(e) => Some(e.election_id),
            ElectionEvent::CandidateDeleted(e) => Some(e.election_id),
            ElectionEvent::Voted(e) => Some(e.election_id),
            ElectionEvent::Paused(e) => Some(e.election_id),
            ElectionEvent::VotingDatesSet(e) => Some(e.election_id),
            ElectionEvent::Delegated(e) => Some(e.election_id),
            ElectionEvent::OwnershipTransferStarted(_) | ElectionEvent::OwnershipTransferred(_) => {
                None
            }
        }
    }

    /// Wraps the event into its raw ledger form at `offset`.
    pub fn into_ledger_event(self, offset: EventOffset, tx_hash: impl Into<String>) -> LedgerEvent {
        let kind = self.kind().to_string();
        let payload = match serde_json::to_value(&self) {
            Ok(Value::Object(mut map)) => map.remove("payload").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        LedgerEvent {
            kind,
            payload,
            block_number: offset.block_number,
            log_index: offset.log_index,
            tx_hash: tx_hash.into(),
        }
    }
}
