//! API response view models

use election_core::eligibility::VotingPhase;
use election_core::projector::ProjectorState;
use election_core::state::{Address, ElectionId, EventOffset, Timestamp};
use serde::Serialize;

/// Per-election entry of `/meta`
#[derive(Debug, Clone, Serialize)]
pub struct ElectionMeta {
    pub election_id: ElectionId,
    pub state: ProjectorState,
    pub cursor: Option<EventOffset>,
    pub candidates: usize,
    pub votes_recorded: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EligibilityView {
    pub election_id: ElectionId,
    pub actor: Address,
    pub now: Timestamp,
    pub eligible: bool,
    pub has_voted: bool,
    pub is_paused: bool,
    pub phase: VotingPhase,
}
