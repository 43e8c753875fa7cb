//! Live-read snapshot construction.

use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::{ElectionError, Result};
use crate::ledger::{ElectionParams, LedgerClient};
use crate::state::{Candidate, Election, ElectionId, ElectionSnapshot, VotingWindow};

pub const DEFAULT_MAX_CONCURRENT_READS: usize = 8;

/// Reads election parameters and every candidate record from the ledger and
/// assembles an [`ElectionSnapshot`]. Either every read succeeds or the build
/// fails; partial snapshots are never returned.
pub struct SnapshotBuilder<L: ?Sized> {
    ledger: Arc<L>,
    max_concurrent_reads: usize,
}

impl<L: LedgerClient + ?Sized> SnapshotBuilder<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self {
            ledger,
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
        }
    }

    pub fn with_max_concurrent_reads(mut self, max_concurrent_reads: usize) -> Self {
        self.max_concurrent_reads = max_concurrent_reads.max(1);
        self
    }

    pub async fn build(&self, election_id: ElectionId) -> Result<ElectionSnapshot> {
        let params = self
            .ledger
            .get_election(election_id)
            .await
            .map_err(unavailable)?;
        let election = election_from_params(election_id, params)?;

        let count = self
            .ledger
            .get_active_candidate_count(election_id)
            .await
            .map_err(unavailable)?;

        let ledger = self.ledger.as_ref();
        let candidates: Vec<Candidate> = stream::iter(1..=count)
            .map(|id| async move {
                ledger
                    .get_candidate(election_id, id)
                    .await
                    .map(|record| record.into_candidate(election_id, id))
            })
            .buffered(self.max_concurrent_reads)
            .try_collect()
            .await
            .map_err(unavailable)?;

        debug!(
            "Read {} candidate records for election {}",
            candidates.len(),
            election_id
        );

        ElectionSnapshot::new(election, candidates)
    }
}

/// Zeroed dates mean the window was never set.
pub fn election_from_params(election_id: ElectionId, params: ElectionParams) -> Result<Election> {
    let window = match (params.start_time, params.end_time) {
        (0, 0) => None,
        (start, end) => Some(VotingWindow::new(start, end).ok_or_else(|| {
            ElectionError::InconsistentSnapshot {
                election_id,
                reason: format!("start time {} is after end time {}", start, end),
            }
        })?),
    };
    Ok(Election {
        id: election_id,
        window,
        is_paused: params.is_paused,
    })
}

fn unavailable(err: ElectionError) -> ElectionError {
    match err {
        ElectionError::LedgerUnavailable(_) => err,
        other => ElectionError::LedgerUnavailable(other.to_string()),
    }
}
