//! Vote tallies and deterministic ranking.

use serde::{Deserialize, Serialize};

use crate::state::{Candidate, ElectionSnapshot};

/// Ranked active candidates and their summed votes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub ranked: Vec<Candidate>,
    pub total: u64,
}

impl Ranking {
    pub fn from_snapshot(snapshot: &ElectionSnapshot) -> Self {
        aggregate(&snapshot.candidates)
    }
}

/// Ranks candidates by descending vote count, ties broken by ascending id.
/// Soft-deleted candidates are excluded from both the ranking and the total.
pub fn aggregate<'a, I>(candidates: I) -> Ranking
where
    I: IntoIterator<Item = &'a Candidate>,
{
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.is_active())
        .cloned()
        .collect();
    ranked.sort_by(|a, b| b.vote_count.cmp(&a.vote_count).then(a.id.cmp(&b.id)));

    let total = ranked
        .iter()
        .fold(0u64, |acc, c| acc.saturating_add(c.vote_count));

    Ranking { ranked, total }
}
