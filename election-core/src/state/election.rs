use serde::{Deserialize, Serialize};

use super::{ElectionId, Timestamp};

/// Voting window as set on the ledger. Invariant: `start_time <= end_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingWindow {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl VotingWindow {
    /// Returns `None` when `start_time > end_time`.
    pub fn new(start_time: Timestamp, end_time: Timestamp) -> Option<Self> {
        (start_time <= end_time).then_some(Self {
            start_time,
            end_time,
        })
    }

    pub fn contains(&self, now: Timestamp) -> bool {
        now >= self.start_time && now <= self.end_time
    }
}

/// Election parameters. `window` is `None` until voting dates are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: ElectionId,
    pub window: Option<VotingWindow>,
    pub is_paused: bool,
}

impl Election {
    pub fn new(id: ElectionId) -> Self {
        Self {
            id,
            window: None,
            is_paused: false,
        }
    }
}
