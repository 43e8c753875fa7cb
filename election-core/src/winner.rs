//! Winner resolution over a ranked candidate list.

use serde::{Deserialize, Serialize};

use crate::state::Candidate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WinnerResolution {
    /// No candidates, or nobody has received a vote yet.
    Undetermined,
    Winner { candidate: Candidate },
}

impl WinnerResolution {
    pub fn winner(&self) -> Option<&Candidate> {
        match self {
            WinnerResolution::Winner { candidate } => Some(candidate),
            WinnerResolution::Undetermined => None,
        }
    }
}

/// Picks the top entry of a list already ranked by [`crate::tally::aggregate`].
pub fn resolve_winner(ranked: &[Candidate]) -> WinnerResolution {
    match ranked.iter().find(|c| c.is_active()) {
        Some(top) if top.vote_count > 0 => WinnerResolution::Winner {
            candidate: top.clone(),
        },
        _ => WinnerResolution::Undetermined,
    }
}
