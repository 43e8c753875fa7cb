//! Local voting-eligibility gate.
//!
//! The result is advisory: the ledger re-checks the same conditions when the
//! vote transaction executes. Keep [`can_vote`] in line with the ledger's
//! revert conditions.

use serde::{Deserialize, Serialize};

use crate::state::{Election, ElectionSnapshot, Timestamp};

/// Where `now` falls relative to the election's voting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingPhase {
    /// Voting dates were never set.
    Unscheduled,
    NotStarted { starts_in: u64 },
    Open { ends_in: u64 },
    Ended,
}

pub fn voting_phase(election: &Election, now: Timestamp) -> VotingPhase {
    match election.window {
        None => VotingPhase::Unscheduled,
        Some(w) if now < w.start_time => VotingPhase::NotStarted {
            starts_in: w.start_time - now,
        },
        Some(w) if now <= w.end_time => VotingPhase::Open {
            ends_in: w.end_time - now,
        },
        Some(_) => VotingPhase::Ended,
    }
}

/// Whether the election accepts votes at `now`, ignoring the actor.
pub fn is_voting_open(election: &Election, now: Timestamp) -> bool {
    !election.is_paused && election.window.is_some_and(|w| w.contains(now))
}

/// `!paused && start <= now <= end && !has_voted`. A missing snapshot or an
/// unscheduled window is never eligible.
pub fn can_vote(snapshot: Option<&ElectionSnapshot>, actor_has_voted: bool, now: Timestamp) -> bool {
    match snapshot {
        Some(snapshot) => is_voting_open(&snapshot.election, now) && !actor_has_voted,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VotingWindow;

    fn snapshot(paused: bool, window: Option<(u64, u64)>) -> ElectionSnapshot {
        ElectionSnapshot {
            election: Election {
                id: 1,
                window: window.map(|(s, e)| VotingWindow {
                    start_time: s,
                    end_time: e,
                }),
                is_paused: paused,
            },
            candidates: vec![],
        }
    }

    #[test]
    fn test_matches_predicate_exhaustively() {
        let (start, end) = (100u64, 200u64);
        for paused in [false, true] {
            for has_voted in [false, true] {
                for now in [0, 99, 100, 150, 200, 201, u64::MAX] {
                    let expected = !paused && now >= start && now <= end && !has_voted;
                    let snap = snapshot(paused, Some((start, end)));
                    assert_eq!(
                        can_vote(Some(&snap), has_voted, now),
                        expected,
                        "paused={paused} has_voted={has_voted} now={now}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_missing_data_is_not_eligible() {
        assert!(!can_vote(None, false, 150));
        assert!(!can_vote(Some(&snapshot(false, None)), false, 150));
    }

    #[test]
    fn test_before_start_is_not_eligible() {
        let snap = snapshot(false, Some((1_000, 2_000)));
        assert!(!can_vote(Some(&snap), false, 999));
    }

    #[test]
    fn test_voting_phase() {
        let election = snapshot(false, Some((100, 200))).election;
        assert_eq!(voting_phase(&election, 40), VotingPhase::NotStarted { starts_in: 60 });
        assert_eq!(voting_phase(&election, 100), VotingPhase::Open { ends_in: 100 });
        assert_eq!(voting_phase(&election, 200), VotingPhase::Open { ends_in: 0 });
        assert_eq!(voting_phase(&election, 201), VotingPhase::Ended);
        assert_eq!(voting_phase(&Election::new(2), 5), VotingPhase::Unscheduled);
    }
}
