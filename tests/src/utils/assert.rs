use election_core::error::ElectionError;
use election_core::ledger::TxReceipt;
use election_core::tally::Ranking;

pub fn assert_rejected(res: Result<TxReceipt, ElectionError>, msg: &str) {
    match res {
        Err(ElectionError::WriteRejected(reason)) => assert!(
            reason.contains(msg),
            "expected rejection containing {msg:?}, got {reason:?}"
        ),
        other => panic!("expected WriteRejected({msg:?}), got {other:?}"),
    }
}

/// Asserts the ranked ids and vote counts, in order.
pub fn assert_ranking(ranking: &Ranking, expected: &[(u64, u64)]) {
    let actual: Vec<(u64, u64)> = ranking
        .ranked
        .iter()
        .map(|c| (c.id, c.vote_count))
        .collect();
    assert_eq!(actual, expected);
    assert_eq!(
        ranking.total,
        expected.iter().map(|(_, votes)| votes).sum::<u64>()
    );
}
