use std::sync::Arc;

use election_core::builder::SnapshotBuilder;
use election_core::ledger::{LedgerClient, NewCandidate};
use election_core::memory::MemoryLedger;
use election_core::projector::Projection;
use election_core::state::{Address, CandidateId, ElectionId, ElectionSnapshot, Timestamp};

use crate::utils::data_types::LedgerTestContext;

pub fn address(n: u32) -> Address {
    format!("0x{:040x}", n)
        .parse()
        .expect("generated address is well formed")
}

pub fn setup_ledger(num_voters: u32) -> LedgerTestContext {
    let admin = address(0xad);
    LedgerTestContext {
        ledger: Arc::new(MemoryLedger::new(admin.clone())),
        admin,
        voters: (1..=num_voters).map(|n| address(0x1000 + n)).collect(),
    }
}

/// Adds `names` as candidates and opens voting over `[start, end]`.
pub async fn create_election(
    context: &LedgerTestContext,
    election_id: ElectionId,
    names: &[&str],
    start: Timestamp,
    end: Timestamp,
) {
    for name in names {
        context
            .ledger
            .submit_add_candidate(
                election_id,
                &context.admin,
                NewCandidate {
                    name: name.to_string(),
                    party: format!("{name} Party"),
                    uri: format!("ipfs://{}", name.to_lowercase()),
                },
            )
            .await
            .unwrap();
    }
    context
        .ledger
        .submit_set_dates(election_id, &context.admin, start, end)
        .await
        .unwrap();
}

/// Casts one vote per entry, drawing fresh voters starting at `first_voter`.
/// Returns the index of the next unused voter.
pub async fn cast_votes(
    context: &LedgerTestContext,
    election_id: ElectionId,
    first_voter: usize,
    votes: &[(CandidateId, usize)],
) -> usize {
    let mut next = first_voter;
    for (candidate_id, count) in votes {
        for _ in 0..*count {
            context
                .ledger
                .submit_vote(election_id, context.voter(next), *candidate_id)
                .await
                .unwrap();
            next += 1;
        }
    }
    next
}

/// Projection rebuilt from the ledger's full event log.
pub fn replay_ledger(context: &LedgerTestContext) -> Projection {
    let mut projection = Projection::new();
    let report = projection.apply_backlog(context.ledger.events());
    assert!(report.skipped.is_empty(), "replay skipped {:?}", report.skipped);
    projection
}

pub async fn live_snapshot(context: &LedgerTestContext, election_id: ElectionId) -> ElectionSnapshot {
    SnapshotBuilder::new(context.ledger.clone())
        .build(election_id)
        .await
        .unwrap()
}
