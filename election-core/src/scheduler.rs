//! Periodic reconciliation against the ledger.
//!
//! One task per election view. The task refreshes on a fixed interval and on
//! demand, publishes immutable [`ElectionView`]s through a watch channel and
//! never runs two refreshes at once. Timer ticks that fire while a refresh is
//! in flight are dropped; forced refreshes requested meanwhile collapse into a
//! single follow-up refresh.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::builder::{SnapshotBuilder, DEFAULT_MAX_CONCURRENT_READS};
use crate::error::Result;
use crate::ledger::LedgerClient;
use crate::projector::Projection;
use crate::state::{Address, Election, ElectionId, ElectionSnapshot, EventOffset};
use crate::tally::Ranking;
use crate::winner::{resolve_winner, WinnerResolution};

/// Leaderboard-class views refresh every five seconds.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_EVENT_BATCH_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub refresh_interval: Duration,
    pub max_concurrent_reads: usize,
    pub event_batch_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
            event_batch_limit: DEFAULT_EVENT_BATCH_LIMIT,
        }
    }
}

/// What consumers see after a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionView {
    pub snapshot: ElectionSnapshot,
    pub ranking: Ranking,
    pub winner: WinnerResolution,
    /// Contract owner as seen by the source. Admin writes are checked against it.
    pub administrator: Option<Address>,
    /// Increments with every published view.
    pub generation: u64,
    pub refreshed_at: Instant,
}

impl ElectionView {
    pub fn new(
        snapshot: ElectionSnapshot,
        administrator: Option<Address>,
        generation: u64,
        refreshed_at: Instant,
    ) -> Self {
        let ranking = Ranking::from_snapshot(&snapshot);
        let winner = resolve_winner(&ranking.ranked);
        Self {
            snapshot,
            ranking,
            winner,
            administrator,
            generation,
            refreshed_at,
        }
    }
}

/// Produces a fresh snapshot for one election.
#[async_trait]
pub trait RefreshSource: Send + Sync + 'static {
    fn election_id(&self) -> ElectionId;

    async fn refresh(&self) -> Result<ElectionSnapshot>;

    /// Sources that cannot see the contract owner publish no administrator.
    async fn administrator(&self) -> Result<Option<Address>> {
        Ok(None)
    }
}

/// Rebuilds the snapshot from live ledger reads.
pub struct LiveReadSource<L: ?Sized> {
    election_id: ElectionId,
    ledger: Arc<L>,
    builder: SnapshotBuilder<L>,
}

impl<L: LedgerClient + ?Sized> LiveReadSource<L> {
    pub fn new(election_id: ElectionId, ledger: Arc<L>, config: &SchedulerConfig) -> Self {
        Self {
            election_id,
            builder: SnapshotBuilder::new(ledger.clone())
                .with_max_concurrent_reads(config.max_concurrent_reads),
            ledger,
        }
    }
}

#[async_trait]
impl<L: LedgerClient + ?Sized + 'static> RefreshSource for LiveReadSource<L> {
    fn election_id(&self) -> ElectionId {
        self.election_id
    }

    async fn refresh(&self) -> Result<ElectionSnapshot> {
        self.builder.build(self.election_id).await
    }

    async fn administrator(&self) -> Result<Option<Address>> {
        self.ledger.get_owner().await.map(Some)
    }
}

/// Pulls new events from the ledger's event stream into a projection.
pub struct EventPollSource<L: ?Sized> {
    election_id: ElectionId,
    ledger: Arc<L>,
    batch_limit: usize,
    state: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    projection: Projection,
    stream_cursor: Option<EventOffset>,
}

impl<L: LedgerClient + ?Sized> EventPollSource<L> {
    pub fn new(election_id: ElectionId, ledger: Arc<L>, config: &SchedulerConfig) -> Self {
        Self {
            election_id,
            ledger,
            batch_limit: config.event_batch_limit.max(1),
            state: Mutex::new(PollState::default()),
        }
    }

    /// Copy of the projection built so far.
    pub async fn projection(&self) -> Projection {
        self.state.lock().await.projection.clone()
    }
}

#[async_trait]
impl<L: LedgerClient + ?Sized + 'static> RefreshSource for EventPollSource<L> {
    fn election_id(&self) -> ElectionId {
        self.election_id
    }

    async fn refresh(&self) -> Result<ElectionSnapshot> {
        let mut state = self.state.lock().await;
        loop {
            let events = self
                .ledger
                .events_after(state.stream_cursor, self.batch_limit)
                .await?;
            let fetched = events.len();
            let Some(last) = events.iter().map(|e| e.offset()).max() else {
                break;
            };
            state.stream_cursor = Some(last);
            let report = state.projection.apply_backlog(events);
            debug!(
                "Polled {} events up to {}: applied={} skipped={}",
                fetched,
                last,
                report.applied,
                report.skipped.len()
            );
            if fetched < self.batch_limit {
                break;
            }
        }

        Ok(state
            .projection
            .snapshot(self.election_id)
            .unwrap_or_else(|| ElectionSnapshot {
                election: Election::new(self.election_id),
                candidates: Vec::new(),
            }))
    }

    async fn administrator(&self) -> Result<Option<Address>> {
        Ok(self.state.lock().await.projection.contract().owner().cloned())
    }
}

#[derive(Debug, Default)]
struct SchedulerStats {
    in_flight: AtomicBool,
    refreshes: AtomicU64,
    failures: AtomicU64,
    coalesced_ticks: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatsSnapshot {
    pub in_flight: bool,
    pub refreshes: u64,
    pub failures: u64,
    pub coalesced_ticks: u64,
}

/// Cloneable handle for requesting refreshes and reading the latest view.
#[derive(Clone)]
pub struct RefreshController {
    election_id: ElectionId,
    force: Arc<Notify>,
    views: watch::Receiver<Option<Arc<ElectionView>>>,
}

impl RefreshController {
    pub fn election_id(&self) -> ElectionId {
        self.election_id
    }

    /// Schedules an out-of-band refresh. Repeated requests made while a
    /// refresh is pending collapse into one.
    pub fn request_refresh(&self) {
        self.force.notify_one();
    }

    pub fn latest(&self) -> Option<Arc<ElectionView>> {
        self.views.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ElectionView>>> {
        self.views.clone()
    }
}

pub struct SchedulerHandle {
    controller: RefreshController,
    shutdown: watch::Sender<bool>,
    stats: Arc<SchedulerStats>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn controller(&self) -> RefreshController {
        self.controller.clone()
    }

    pub fn request_refresh(&self) {
        self.controller.request_refresh();
    }

    pub fn latest(&self) -> Option<Arc<ElectionView>> {
        self.controller.latest()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ElectionView>>> {
        self.controller.subscribe()
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            in_flight: self.stats.in_flight.load(Ordering::SeqCst),
            refreshes: self.stats.refreshes.load(Ordering::SeqCst),
            failures: self.stats.failures.load(Ordering::SeqCst),
            coalesced_ticks: self.stats.coalesced_ticks.load(Ordering::SeqCst),
        }
    }

    /// Stops the loop. An in-flight refresh is abandoned and its result is
    /// never published.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Starts the reconciliation loop for `source`. The first refresh runs immediately.
pub fn spawn<S: RefreshSource>(source: S, config: &SchedulerConfig) -> SchedulerHandle {
    let election_id = source.election_id();
    let force = Arc::new(Notify::new());
    let (views_tx, views_rx) = watch::channel(None);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stats = Arc::new(SchedulerStats::default());

    let task = tokio::spawn(run(
        source,
        config.refresh_interval,
        force.clone(),
        shutdown_rx,
        views_tx,
        stats.clone(),
    ));

    info!(
        "Started reconciliation for election {} every {:?}",
        election_id, config.refresh_interval
    );

    SchedulerHandle {
        controller: RefreshController {
            election_id,
            force,
            views: views_rx,
        },
        shutdown: shutdown_tx,
        stats,
        task: Some(task),
    }
}

enum Trigger {
    Tick(Instant),
    Forced,
}

async fn run<S: RefreshSource>(
    source: S,
    interval: Duration,
    force: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
    views: watch::Sender<Option<Arc<ElectionView>>>,
    stats: Arc<SchedulerStats>,
) {
    let election_id = source.election_id();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut generation = 0u64;
    let mut last_finished: Option<Instant> = None;

    loop {
        let trigger = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = force.notified() => Trigger::Forced,
            at = ticker.tick() => Trigger::Tick(at),
        };

        if let Trigger::Tick(at) = trigger {
            if last_finished.is_some_and(|finished| at < finished) {
                stats.coalesced_ticks.fetch_add(1, Ordering::SeqCst);
                debug!("Skipping tick for election {} that fired mid-refresh", election_id);
                continue;
            }
        }

        stats.in_flight.store(true, Ordering::SeqCst);
        let result = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                stats.in_flight.store(false, Ordering::SeqCst);
                break;
            }
            result = refresh_view(&source) => result,
        };
        stats.in_flight.store(false, Ordering::SeqCst);
        let finished = Instant::now();
        last_finished = Some(finished);

        match result {
            Ok((snapshot, administrator)) => {
                generation += 1;
                stats.refreshes.fetch_add(1, Ordering::SeqCst);
                views.send_replace(Some(Arc::new(ElectionView::new(
                    snapshot,
                    administrator,
                    generation,
                    finished,
                ))));
            }
            Err(e) => {
                stats.failures.fetch_add(1, Ordering::SeqCst);
                warn!(
                    "Refresh for election {} failed, keeping previous view: {}",
                    election_id, e
                );
            }
        }
    }

    debug!("Reconciliation for election {} stopped", election_id);
}

async fn refresh_view<S: RefreshSource>(source: &S) -> Result<(ElectionSnapshot, Option<Address>)> {
    let snapshot = source.refresh().await?;
    let administrator = source.administrator().await?;
    Ok((snapshot, administrator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ElectionError;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl RefreshSource for CountingSource {
        fn election_id(&self) -> ElectionId {
            1
        }

        async fn refresh(&self) -> Result<ElectionSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ElectionError::LedgerUnavailable("down".to_string()));
            }
            Ok(ElectionSnapshot {
                election: Election::new(1),
                candidates: Vec::new(),
            })
        }
    }

    fn config(interval_ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            refresh_interval: Duration::from_millis(interval_ms),
            ..SchedulerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_on_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = spawn(
            CountingSource {
                calls: calls.clone(),
                delay: Duration::ZERO,
                fail: false,
            },
            &config(1_000),
        );
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(handle.latest().map(|v| v.generation), Some(4));
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_during_refresh_are_coalesced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = spawn(
            CountingSource {
                calls: calls.clone(),
                delay: Duration::from_millis(2_500),
                fail: false,
            },
            &config(1_000),
        );
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        // Refreshes start at 0 and 3000; ticks at 1000 and 2000 land mid-refresh.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(handle.stats().coalesced_ticks >= 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_refresh_skips_the_wait() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = spawn(
            CountingSource {
                calls: calls.clone(),
                delay: Duration::ZERO,
                fail: false,
            },
            &config(60_000),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The first request wakes the loop; the rest fold into one follow-up.
        handle.request_refresh();
        handle.request_refresh();
        handle.request_refresh();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(handle.latest().map(|v| v.generation), Some(3));
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_keep_stale_view() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = spawn(
            CountingSource {
                calls: calls.clone(),
                delay: Duration::ZERO,
                fail: true,
            },
            &config(1_000),
        );
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(handle.latest().is_none());
        assert_eq!(handle.stats().failures, 3);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_in_flight_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = spawn(
            CountingSource {
                calls: calls.clone(),
                delay: Duration::from_millis(5_000),
                fail: false,
            },
            &config(1_000),
        );
        let views = handle.subscribe();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.stats().in_flight);
        handle.stop().await;
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(views.borrow().is_none());
    }
}
