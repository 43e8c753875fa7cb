use std::sync::Arc;
use std::time::Duration;

use election_core::actions::ElectionActions;
use election_core::builder::SnapshotBuilder;
use election_core::eligibility::can_vote;
use election_core::error::ElectionError;
use election_core::ledger::{LedgerClient, NewCandidate};
use election_core::memory::MemoryLedger;
use election_core::scheduler::{
    spawn, ElectionView, EventPollSource, LiveReadSource, RefreshSource, SchedulerConfig,
    SchedulerHandle,
};

use crate::utils::{assert::assert_rejected, ledger_utils::*};

async fn wait_for_view(
    handle: &SchedulerHandle,
    ready: impl Fn(&ElectionView) -> bool,
) -> Arc<ElectionView> {
    let mut rx = handle.subscribe();
    let view = tokio::time::timeout(
        Duration::from_secs(30),
        rx.wait_for(|v| v.as_deref().is_some_and(&ready)),
    )
    .await
    .expect("timed out waiting for view")
    .expect("scheduler stopped");
    view.clone().unwrap()
}

async fn wait_for_generation(handle: &SchedulerHandle, generation: u64) -> Arc<ElectionView> {
    wait_for_view(handle, |v| v.generation >= generation).await
}

fn manual_config() -> SchedulerConfig {
    SchedulerConfig {
        refresh_interval: Duration::from_secs(3600),
        event_batch_limit: 4,
        ..SchedulerConfig::default()
    }
}

#[tokio::test]
async fn test_live_reads_and_event_polling_converge() {
    let context = setup_ledger(10);
    let config = manual_config();
    let live = spawn(LiveReadSource::new(1, context.ledger.clone(), &config), &config);
    let polled = spawn(EventPollSource::new(1, context.ledger.clone(), &config), &config);
    wait_for_generation(&live, 1).await;
    wait_for_generation(&polled, 1).await;

    let actions = ElectionActions::new(context.ledger.clone(), live.controller());
    for name in ["Alice", "Bob", "Carol"] {
        actions
            .add_candidate(
                &context.admin,
                NewCandidate {
                    name: name.to_string(),
                    party: "Independent".to_string(),
                    uri: String::new(),
                },
            )
            .await
            .unwrap();
    }
    actions.set_dates(&context.admin, 100, 200).await.unwrap();
    context.ledger.set_time(120);
    wait_for_view(&live, |v| v.snapshot.election.window.is_some()).await;

    let ballots = [3, 2, 3, 1, 3, 2];
    for (i, candidate_id) in ballots.iter().enumerate() {
        actions.cast_vote(context.voter(i), *candidate_id, 120).await.unwrap();
    }
    actions.delete_candidate(&context.admin, 1).await.unwrap();

    // Every write asked the live scheduler to refresh; the poller only moves
    // when told to.
    let settled = |v: &ElectionView| v.snapshot.candidates.len() == 2 && v.ranking.total == 5;
    polled.request_refresh();
    let live_view = wait_for_view(&live, settled).await;
    let polled_view = wait_for_view(&polled, settled).await;

    assert_eq!(live_view.snapshot, polled_view.snapshot);
    assert_eq!(live_view.ranking, polled_view.ranking);
    assert_eq!(live_view.winner, polled_view.winner);
    assert_eq!(live_view.ranking.total, 5);
    assert_eq!(live_view.winner.winner().map(|c| c.id), Some(3));

    live.stop().await;
    polled.stop().await;
}

#[tokio::test]
async fn test_event_polling_pages_through_backlog() {
    let context = setup_ledger(20);
    context.ledger.set_time(150);
    create_election(&context, 4, &["Heidi", "Ivan"], 100, 200).await;
    cast_votes(&context, 4, 0, &[(1, 7), (2, 9)]).await;
    // Unrelated election sharing the event stream.
    create_election(&context, 5, &["Judy"], 100, 200).await;

    let config = manual_config();
    let source = EventPollSource::new(4, context.ledger.clone(), &config);
    let snapshot = source.refresh().await.unwrap();
    assert_eq!(snapshot, live_snapshot(&context, 4).await);

    // The poller projected every election it saw, not just its own.
    let projection = source.projection().await;
    assert_eq!(projection, replay_ledger(&context));
    assert_eq!(projection.snapshot(5).unwrap().candidates.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_outage_keeps_stale_view() {
    let context = setup_ledger(4);
    context.ledger.set_time(150);
    create_election(&context, 1, &["Alice", "Bob"], 100, 200).await;
    cast_votes(&context, 1, 0, &[(2, 1)]).await;

    let config = SchedulerConfig {
        refresh_interval: Duration::from_secs(1),
        ..SchedulerConfig::default()
    };
    let handle = spawn(LiveReadSource::new(1, context.ledger.clone(), &config), &config);
    let first = wait_for_generation(&handle, 1).await;
    assert_eq!(first.ranking.total, 1);

    context.ledger.set_reads_down(true);
    cast_votes(&context, 1, 1, &[(1, 2)]).await;
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let stats = handle.stats();
    assert!(stats.failures >= 3, "{stats:?}");
    let stale = handle.latest().unwrap();
    assert_eq!(stale.generation, first.generation);
    assert_eq!(stale.ranking.total, 1);

    context.ledger.set_reads_down(false);
    let recovered = wait_for_generation(&handle, first.generation + 1).await;
    assert_eq!(recovered.ranking.total, 3);
    assert_eq!(recovered.winner.winner().map(|c| c.id), Some(1));
    handle.stop().await;
}

#[tokio::test]
async fn test_stale_gate_is_corrected_after_rejection() {
    let context = setup_ledger(4);
    let config = manual_config();
    let handle = spawn(LiveReadSource::new(1, context.ledger.clone(), &config), &config);
    let actions = ElectionActions::new(context.ledger.clone(), handle.controller());
    create_election(&context, 1, &["Alice"], 100, 200).await;
    context.ledger.set_time(150);
    handle.request_refresh();
    wait_for_view(&handle, |v| v.snapshot.election.window.is_some()).await;

    // The admin moves the window behind the scheduler's back.
    context
        .ledger
        .submit_set_dates(1, &context.admin, 300, 400)
        .await
        .unwrap();
    let voter = context.voter(0);
    assert!(actions.can_actor_vote(voter, 150).await);

    let err = actions.cast_vote(voter, 1, 150).await.unwrap_err();
    assert_eq!(err, ElectionError::WriteRejected("Voting is not active".to_string()));
    // The rejection alone triggers the refresh that corrects the window.
    wait_for_view(&handle, |v| {
        v.snapshot.election.window.map(|w| w.start_time) == Some(300)
    })
    .await;
    assert!(!actions.can_actor_vote(voter, 150).await);
    assert!(actions.can_actor_vote(voter, 300).await);
    handle.stop().await;
}

/// The local gate, live-read or replayed, and the ledger's own revert
/// conditions must agree on every combination of pause state, clock position
/// and prior vote.
#[tokio::test]
async fn test_gate_matches_ledger_reverts() {
    let context = setup_ledger(2);
    let ledger: Arc<MemoryLedger> = context.ledger.clone();
    let builder = SnapshotBuilder::new(ledger.clone());
    let actor = context.voter(0);
    let mut election_id = 100;

    for paused in [false, true] {
        for has_voted in [false, true] {
            for now in [0, 99, 100, 150, 200, 201] {
                election_id += 1;
                create_election(&context, election_id, &["Only", "Other"], 100, 200).await;
                if has_voted {
                    ledger.set_time(150);
                    ledger.submit_vote(election_id, actor, 1).await.unwrap();
                }
                if paused {
                    ledger.submit_toggle_pause(election_id, &context.admin).await.unwrap();
                }
                ledger.set_time(now);

                let snapshot = builder.build(election_id).await.unwrap();
                let voted = ledger.check_voted(election_id, actor).await.unwrap();
                let gate = can_vote(Some(&snapshot), voted, now);
                let replayed = replay_ledger(&context).can_actor_vote(election_id, actor, now);
                let outcome = ledger.submit_vote(election_id, actor, 2).await;
                assert_eq!(
                    gate,
                    outcome.is_ok(),
                    "paused={paused} has_voted={has_voted} now={now}: {outcome:?}"
                );
                assert_eq!(replayed, gate, "replay disagrees at now={now}");
            }
        }
    }

    // An election whose dates were never set is closed on every side.
    ledger.set_time(150);
    let snapshot = builder.build(999).await.unwrap();
    assert!(!can_vote(Some(&snapshot), false, 150));
    assert!(!replay_ledger(&context).can_actor_vote(999, actor, 150));
    assert_rejected(ledger.submit_vote(999, actor, 1).await, "Voting is not active");

    // Dates reset to (0, 0) read as unscheduled, even at time zero.
    create_election(&context, 1_000, &["Only"], 0, 0).await;
    ledger.set_time(0);
    let snapshot = builder.build(1_000).await.unwrap();
    assert_eq!(snapshot.election.window, None);
    let replayed = replay_ledger(&context);
    assert_eq!(replayed.snapshot(1_000).unwrap(), snapshot);
    assert!(!can_vote(Some(&snapshot), false, 0));
    assert!(!replayed.can_actor_vote(1_000, actor, 0));
    assert_rejected(ledger.submit_vote(1_000, actor, 1).await, "Voting is not active");
}

#[tokio::test]
async fn test_polled_owner_gates_admin_writes() {
    let context = setup_ledger(2);
    let config = manual_config();
    let handle = spawn(EventPollSource::new(1, context.ledger.clone(), &config), &config);
    let actions = ElectionActions::new(context.ledger.clone(), handle.controller());
    wait_for_view(&handle, |v| v.administrator.as_ref() == Some(&context.admin)).await;

    let successor = address(0xbeef);
    context
        .ledger
        .transfer_ownership(&context.admin, successor.clone())
        .unwrap();
    handle.request_refresh();
    wait_for_view(&handle, |v| v.administrator.as_ref() == Some(&successor)).await;

    let events_before = context.ledger.events().len();
    assert_eq!(
        actions.toggle_pause(&context.admin).await.unwrap_err(),
        ElectionError::AccessDenied { actor: context.admin.clone() }
    );
    assert_eq!(context.ledger.events().len(), events_before);
    actions.toggle_pause(&successor).await.unwrap();
    wait_for_view(&handle, |v| v.snapshot.election.is_paused).await;
    handle.stop().await;
}
