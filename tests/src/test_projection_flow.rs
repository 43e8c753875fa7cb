use cli::EventLog;
use election_core::error::ElectionError;
use election_core::ledger::LedgerClient;
use election_core::projector::{ApplyOutcome, Projection, ProjectorState};
use election_core::state::{
    CandidateAdded, ElectionEvent, EventOffset, LedgerEvent, VotingDatesSet,
};
use election_core::tally::{aggregate, Ranking};
use election_core::winner::WinnerResolution;

use crate::utils::{
    assert::{assert_ranking, assert_rejected},
    data_types::LedgerTestContext,
    ledger_utils::*,
};

const TIED: u64 = 1;
const NOT_STARTED: u64 = 2;
const DELETION: u64 = 3;

async fn test_tie_breaks_by_id(context: &LedgerTestContext) -> usize {
    create_election(context, TIED, &["Alice", "Bob", "Carol"], 100, 200).await;
    // Bob reaches five first; Alice still ranks ahead on id.
    let next = cast_votes(context, TIED, 0, &[(2, 5), (3, 2), (1, 5)]).await;

    let projection = replay_ledger(context);
    let ranking = projection.ranking(TIED).unwrap();
    assert_ranking(&ranking, &[(1, 5), (2, 5), (3, 2)]);
    match projection.winner(TIED).unwrap() {
        WinnerResolution::Winner { candidate } => {
            assert_eq!(candidate.id, 1);
            assert_eq!(candidate.name, "Alice");
        }
        WinnerResolution::Undetermined => panic!("tied election must still have a winner"),
    }

    // Live reads agree with the replayed log.
    let live = live_snapshot(context, TIED).await;
    assert_eq!(Ranking::from_snapshot(&live), ranking);
    assert_eq!(live, projection.snapshot(TIED).unwrap());

    // Re-aggregating an unchanged set never changes the order.
    let again = aggregate(projection.election(TIED).unwrap().all_candidates());
    assert_eq!(again, ranking);
    next
}

async fn test_not_started(context: &LedgerTestContext, next_voter: usize) {
    create_election(context, NOT_STARTED, &["Dave"], 1_000, 2_000).await;
    let projection = replay_ledger(context);
    let voter = context.voter(next_voter);

    assert!(!projection.can_actor_vote(NOT_STARTED, voter, 999));
    assert!(projection.can_actor_vote(NOT_STARTED, voter, 1_000));
    assert!(projection.can_actor_vote(NOT_STARTED, voter, 2_000));
    assert!(!projection.can_actor_vote(NOT_STARTED, voter, 2_001));

    // The ledger clock is still at 150, so the ledger refuses too.
    assert_rejected(
        context.ledger.submit_vote(NOT_STARTED, voter, 1).await,
        "Voting is not active",
    );
    assert_eq!(
        projection.winner(NOT_STARTED).unwrap(),
        WinnerResolution::Undetermined
    );
}

async fn test_voted_actor_stays_ineligible(context: &LedgerTestContext) {
    // Voter 0 voted in the tied election.
    let voter = context.voter(0);
    let projection = replay_ledger(context);
    for now in [100, 150, 200] {
        assert!(!projection.can_actor_vote(TIED, voter, now));
    }
    assert!(projection.election(TIED).unwrap().has_voted(voter));
    assert_rejected(
        context.ledger.submit_vote(TIED, voter, 3).await,
        "Already voted",
    );

    // Pausing and resuming does not reset it.
    context
        .ledger
        .submit_toggle_pause(TIED, &context.admin)
        .await
        .unwrap();
    context
        .ledger
        .submit_toggle_pause(TIED, &context.admin)
        .await
        .unwrap();
    let projection = replay_ledger(context);
    assert!(!projection.election(TIED).unwrap().election().is_paused);
    assert!(!projection.can_actor_vote(TIED, voter, 150));

    // Eligibility is per election.
    assert!(projection.can_actor_vote(NOT_STARTED, voter, 1_500));
}

async fn test_deleted_candidate_keeps_votes(context: &LedgerTestContext, next_voter: usize) {
    create_election(context, DELETION, &["Erin", "Frank"], 100, 200).await;
    cast_votes(context, DELETION, next_voter, &[(1, 10), (2, 3)]).await;
    context
        .ledger
        .submit_delete_candidate(DELETION, &context.admin, 1)
        .await
        .unwrap();

    let projection = replay_ledger(context);
    let election = projection.election(DELETION).unwrap();
    let active = projection.active_candidates(DELETION).unwrap();
    assert_eq!(active.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2]);

    let erin = election.candidate(1).unwrap();
    assert!(erin.is_deleted);
    assert_eq!(erin.vote_count, 10);
    assert_eq!(election.vote_records().filter(|v| v.candidate_id == 1).count(), 10);

    assert_ranking(&projection.ranking(DELETION).unwrap(), &[(2, 3)]);
    assert_eq!(
        projection.winner(DELETION).unwrap().winner().map(|c| c.id),
        Some(2)
    );

    let live = live_snapshot(context, DELETION).await;
    assert_eq!(live.candidates.len(), 1);
    assert_eq!(live, projection.snapshot(DELETION).unwrap());
    assert_rejected(
        context.ledger.submit_vote(DELETION, context.voter(0), 1).await,
        "Candidate deleted",
    );
}

fn test_misordered_log(context: &LedgerTestContext) {
    let in_order = replay_ledger(context);
    let events = context.ledger.events();

    // A reversed backlog is sorted and reported.
    let mut reversed = events.clone();
    reversed.reverse();
    let mut projection = Projection::new();
    let report = projection.apply_backlog(reversed);
    assert!(report.reordered);
    assert_eq!(report.applied, events.len());
    assert_eq!(projection.snapshot(TIED), in_order.snapshot(TIED));
    assert_eq!(projection.ranking(DELETION), in_order.ranking(DELETION));

    // Live, an event older than the cursor is rejected, not applied.
    let held_back = events
        .iter()
        .position(|e| e.kind == "Voted")
        .expect("log contains votes");
    let mut projection = Projection::new();
    for (i, event) in events.iter().enumerate() {
        if i != held_back {
            assert_eq!(projection.apply(event), ApplyOutcome::Applied);
        }
    }
    let before = projection.ranking(TIED);
    let ApplyOutcome::Skipped(warning) = projection.apply(&events[held_back]) else {
        panic!("late event must be skipped");
    };
    assert_eq!(warning.offset, events[held_back].offset());
    assert!(warning.reason.contains("out of order"));
    assert!(matches!(
        warning.into_error(),
        ElectionError::MalformedEvent { .. }
    ));
    assert_eq!(projection.ranking(TIED), before);
    assert_eq!(projection.warnings().len(), 1);
}

fn test_idempotent_replay(context: &LedgerTestContext) {
    let events = context.ledger.events();
    let once = replay_ledger(context);

    let mut twice = Projection::new();
    twice.apply_backlog(events.clone());
    let report = twice.apply_backlog(events.clone());
    assert_eq!(report.applied, 0);
    assert_eq!(report.duplicates, events.len());
    assert_eq!(twice, once);

    // Prefix, then the remainder with some overlap.
    let mut split = Projection::new();
    let mid = events.len() / 2;
    split.apply_backlog(events[..mid].to_vec());
    split.apply_backlog(events[mid - 3..].to_vec());
    assert_eq!(split, once);
    assert_eq!(split.state(TIED), ProjectorState::Live);
}

fn test_exported_log_replays(context: &LedgerTestContext) {
    let events = context.ledger.events();
    let body = serde_json::to_vec(&serde_json::json!({ "events": events })).unwrap();
    let log = EventLog::from_slice(&body).unwrap();
    let (projection, report) = log.replay();
    assert!(!report.reordered);
    assert_eq!(report.applied, events.len());
    assert_eq!(projection, replay_ledger(context));
}

#[tokio::test]
async fn main() {
    let context = setup_ledger(40);
    context.ledger.set_time(150);

    println!("Testing tie ordering");
    let next_voter = test_tie_breaks_by_id(&context).await;
    println!("Testing window before start");
    test_not_started(&context, next_voter).await;
    println!("Testing repeat votes");
    test_voted_actor_stays_ineligible(&context).await;
    println!("Testing soft deletion");
    test_deleted_candidate_keeps_votes(&context, next_voter + 1).await;
    println!("Testing misordered delivery");
    test_misordered_log(&context);
    println!("Testing replay");
    test_idempotent_replay(&context);
    test_exported_log_replays(&context);
}

#[test]
fn test_misordered_log_index_within_block() {
    let dates = ElectionEvent::VotingDatesSet(VotingDatesSet {
        election_id: 9,
        start_date: 10,
        end_date: 20,
    })
    .into_ledger_event(EventOffset::new(7, 0), "0x07");
    let added = ElectionEvent::CandidateAdded(CandidateAdded {
        election_id: 9,
        id: 1,
        name: "Grace".to_string(),
        party: "G".to_string(),
        metadata_uri: String::new(),
    })
    .into_ledger_event(EventOffset::new(7, 1), "0x07");
    let misordered: Vec<LedgerEvent> = vec![added.clone(), dates.clone()];

    let mut backlog = Projection::new();
    let report = backlog.apply_backlog(misordered.clone());
    assert!(report.reordered);
    assert_eq!(report.applied, 2);
    assert!(backlog.election(9).unwrap().election().window.is_some());

    let mut live = Projection::new();
    assert_eq!(live.apply(&misordered[0]), ApplyOutcome::Applied);
    assert!(matches!(live.apply(&misordered[1]), ApplyOutcome::Skipped(_)));
    assert!(live.election(9).unwrap().election().window.is_none());
    assert!(!live.can_actor_vote(9, &address(1), 15));

    // Redelivering the rejected event does not sneak it in later.
    assert!(matches!(live.apply(&dates), ApplyOutcome::Skipped(_)));
    assert_eq!(live.warnings().len(), 2);
}
