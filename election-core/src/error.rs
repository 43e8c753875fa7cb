use thiserror::Error;

use crate::state::{Address, ElectionId, EventOffset};

/// Errors surfaced by the projection and eligibility engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ElectionError {
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("Access denied: {actor} is not the election administrator")]
    AccessDenied { actor: Address },
    #[error("Actor {actor} is not eligible to vote in election {election_id}")]
    IneligibleVote {
        election_id: ElectionId,
        actor: Address,
    },
    #[error("Write rejected by ledger: {0}")]
    WriteRejected(String),
    #[error("Malformed event at {offset}: {reason}")]
    MalformedEvent { offset: EventOffset, reason: String },
    #[error("Inconsistent snapshot for election {election_id}: {reason}")]
    InconsistentSnapshot {
        election_id: ElectionId,
        reason: String,
    },
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl ElectionError {
    /// Read failures degrade to a stale view; everything else is terminal for the attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ElectionError::LedgerUnavailable(_) | ElectionError::InconsistentSnapshot { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ElectionError>;
