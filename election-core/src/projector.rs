//! Event projection.
//!
//! Turns the ledger's ordered event log into queryable entities. Each election
//! owns its own [`ElectionProjector`] with its own cursor, and contract-wide
//! ownership events feed a separate [`ContractProjector`].
//!
//! Ordering contract: events are applied in ascending `(block_number,
//! log_index)` order. An event at or below the cursor that was already seen is
//! a no-op, which makes re-delivery and replay idempotent. An event below the
//! cursor that was never seen arrived out of order and is rejected with a
//! warning rather than applied against a state that has already moved on.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::eligibility::can_vote;
use crate::error::ElectionError;
use crate::state::{
    Address, Candidate, CandidateId, Delegation, Election, ElectionEvent, ElectionId,
    ElectionSnapshot, EventOffset, LedgerEvent, OwnershipChange, Timestamp, VoteRecord,
    VotingWindow,
};
use crate::tally::{aggregate, Ranking};
use crate::winner::{resolve_winner, WinnerResolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectorState {
    /// No events applied yet.
    Uninitialized,
    /// Applying a backlog.
    CatchingUp,
    /// Backlog drained; new events are applied as they arrive.
    Live,
}

/// A skipped event, kept so operators can see why it was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionWarning {
    pub offset: EventOffset,
    pub tx_hash: String,
    pub kind: String,
    pub reason: String,
}

impl ProjectionWarning {
    fn new(event: &LedgerEvent, reason: impl Into<String>) -> Self {
        Self {
            offset: event.offset(),
            tx_hash: event.tx_hash.clone(),
            kind: event.kind.clone(),
            reason: reason.into(),
        }
    }

    pub fn into_error(self) -> ElectionError {
        ElectionError::MalformedEvent {
            offset: self.offset,
            reason: self.reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Already seen at this offset; nothing changed.
    Duplicate,
    Skipped(ProjectionWarning),
}

/// Counts for one ingested batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub applied: usize,
    pub duplicates: usize,
    pub skipped: Vec<ProjectionWarning>,
    /// The batch was not delivered in offset order and had to be sorted.
    pub reordered: bool,
}

impl BatchReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.applied += 1,
            ApplyOutcome::Duplicate => self.duplicates += 1,
            ApplyOutcome::Skipped(warning) => self.skipped.push(warning),
        }
    }
}

/// Last applied offset plus the offsets at or below it that no projected
/// entity records on its own. Votes, delegations and candidate changes carry
/// their offsets, so `marks` only holds admin settings and skipped events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Cursor {
    last: Option<EventOffset>,
    marks: BTreeSet<EventOffset>,
}

enum Admission {
    New,
    Duplicate,
    Late,
}

impl Cursor {
    /// `recorded` reports whether an entity already carries `offset`.
    fn admit(&self, offset: EventOffset, recorded: impl FnOnce() -> bool) -> Admission {
        match self.last {
            Some(last) if offset <= last => {
                if self.marks.contains(&offset) || recorded() {
                    Admission::Duplicate
                } else {
                    Admission::Late
                }
            }
            _ => Admission::New,
        }
    }

    fn advance(&mut self, offset: EventOffset) {
        self.last = Some(self.last.map_or(offset, |last| last.max(offset)));
    }

    fn mark(&mut self, offset: EventOffset) {
        self.advance(offset);
        self.marks.insert(offset);
    }

    /// Records an undecodable event so that its re-delivery is a no-op.
    fn skip(&mut self, raw: &LedgerEvent, reason: String) -> ApplyOutcome {
        match self.admit(raw.offset(), || false) {
            Admission::Duplicate => ApplyOutcome::Duplicate,
            Admission::New => {
                self.mark(raw.offset());
                ApplyOutcome::Skipped(ProjectionWarning::new(raw, reason))
            }
            Admission::Late => ApplyOutcome::Skipped(ProjectionWarning::new(raw, reason)),
        }
    }
}

/// Offsets of the events that added and deleted a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CandidateOffsets {
    added: EventOffset,
    deleted: Option<EventOffset>,
}

/// Projected entities for one election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionProjector {
    election: Election,
    candidates: BTreeMap<CandidateId, Candidate>,
    votes: BTreeMap<Address, VoteRecord>,
    delegations: Vec<Delegation>,
    candidate_offsets: BTreeMap<CandidateId, CandidateOffsets>,
    cursor: Cursor,
    state: ProjectorState,
}

impl ElectionProjector {
    pub fn new(election_id: ElectionId) -> Self {
        Self {
            election: Election::new(election_id),
            candidates: BTreeMap::new(),
            votes: BTreeMap::new(),
            delegations: Vec::new(),
            candidate_offsets: BTreeMap::new(),
            cursor: Cursor::default(),
            state: ProjectorState::Uninitialized,
        }
    }

    pub fn election(&self) -> &Election {
        &self.election
    }

    pub fn state(&self) -> ProjectorState {
        self.state
    }

    pub fn cursor(&self) -> Option<EventOffset> {
        self.cursor.last
    }

    /// Every candidate ever added, soft-deleted ones included.
    pub fn all_candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.values()
    }

    /// Audit lookup; returns soft-deleted candidates too.
    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.get(&id)
    }

    pub fn active_candidates(&self) -> Vec<Candidate> {
        self.candidates
            .values()
            .filter(|c| c.is_active())
            .cloned()
            .collect()
    }

    pub fn vote_records(&self) -> impl Iterator<Item = &VoteRecord> {
        self.votes.values()
    }

    pub fn delegations(&self) -> &[Delegation] {
        &self.delegations
    }

    /// Delegations are kept in offset order.
    pub fn delegation_at(&self, offset: EventOffset) -> Option<&Delegation> {
        self.delegations
            .binary_search_by_key(&offset, |d| d.offset)
            .ok()
            .map(|idx| &self.delegations[idx])
    }

    pub fn vote_record(&self, actor: &Address) -> Option<&VoteRecord> {
        self.votes.get(actor)
    }

    pub fn has_voted(&self, actor: &Address) -> bool {
        self.votes.contains_key(actor)
    }

    pub fn snapshot(&self) -> ElectionSnapshot {
        ElectionSnapshot {
            election: self.election.clone(),
            candidates: self.active_candidates(),
        }
    }

    pub fn ranking(&self) -> Ranking {
        aggregate(self.candidates.values())
    }

    pub fn winner(&self) -> WinnerResolution {
        resolve_winner(&self.ranking().ranked)
    }

    pub fn can_actor_vote(&self, actor: &Address, now: Timestamp) -> bool {
        can_vote(Some(&self.snapshot()), self.has_voted(actor), now)
    }

    fn begin_catch_up(&mut self) {
        if self.state == ProjectorState::Uninitialized {
            self.state = ProjectorState::CatchingUp;
        }
    }

    fn go_live(&mut self) {
        self.state = ProjectorState::Live;
    }

    /// Applies one decoded event belonging to this election.
    fn apply(&mut self, raw: &LedgerEvent, event: &ElectionEvent) -> ApplyOutcome {
        let offset = raw.offset();
        match self.cursor.admit(offset, || self.records(offset, event)) {
            Admission::Duplicate => return ApplyOutcome::Duplicate,
            Admission::Late => {
                return ApplyOutcome::Skipped(ProjectionWarning::new(
                    raw,
                    format!(
                        "arrived out of order after offset {}",
                        self.cursor.last.map_or_else(String::new, |c| c.to_string())
                    ),
                ))
            }
            Admission::New => {}
        }

        let result = self.mutate(raw, event);
        match (&result, event) {
            (Ok(()), ElectionEvent::Paused(_) | ElectionEvent::VotingDatesSet(_)) | (Err(_), _) => {
                self.cursor.mark(offset)
            }
            (Ok(()), _) => self.cursor.advance(offset),
        }
        if self.state == ProjectorState::Uninitialized {
            self.state = ProjectorState::Live;
        }
        match result {
            Ok(()) => ApplyOutcome::Applied,
            Err(reason) => ApplyOutcome::Skipped(ProjectionWarning::new(raw, reason)),
        }
    }

    /// Whether an applied entity change carries `offset`.
    fn records(&self, offset: EventOffset, event: &ElectionEvent) -> bool {
        match event {
            ElectionEvent::CandidateAdded(e) => self
                .candidate_offsets
                .get(&e.id)
                .is_some_and(|o| o.added == offset),
            ElectionEvent::CandidateDeleted(e) => self
                .candidate_offsets
                .get(&e.id)
                .is_some_and(|o| o.deleted == Some(offset)),
            ElectionEvent::Voted(e) => self.votes.get(&e.voter).is_some_and(|v| v.offset == offset),
            ElectionEvent::Delegated(_) => self.delegation_at(offset).is_some(),
            _ => false,
        }
    }

    fn skip(&mut self, raw: &LedgerEvent, reason: String) -> ApplyOutcome {
        let outcome = self.cursor.skip(raw, reason);
        if self.state == ProjectorState::Uninitialized && self.cursor.last.is_some() {
            self.state = ProjectorState::Live;
        }
        outcome
    }

    fn mutate(&mut self, raw: &LedgerEvent, event: &ElectionEvent) -> Result<(), String> {
        let election_id = self.election.id;
        match event {
            ElectionEvent::CandidateAdded(e) => {
                if self.candidates.contains_key(&e.id) {
                    return Err(format!("candidate {} already exists", e.id));
                }
                self.candidates.insert(
                    e.id,
                    Candidate {
                        id: e.id,
                        election_id,
                        name: e.name.clone(),
                        party: e.party.clone(),
                        metadata_uri: e.metadata_uri.clone(),
                        vote_count: 0,
                        is_deleted: false,
                    },
                );
                self.candidate_offsets.insert(
                    e.id,
                    CandidateOffsets {
                        added: raw.offset(),
                        deleted: None,
                    },
                );
            }
            ElectionEvent::CandidateDeleted(e) => {
                let candidate = self
                    .candidates
                    .get_mut(&e.id)
                    .ok_or_else(|| format!("unknown candidate {}", e.id))?;
                if candidate.is_deleted {
                    return Err(format!("candidate {} already deleted", e.id));
                }
                candidate.is_deleted = true;
                if let Some(offsets) = self.candidate_offsets.get_mut(&e.id) {
                    offsets.deleted = Some(raw.offset());
                }
            }
            ElectionEvent::Voted(e) => {
                if self.votes.contains_key(&e.voter) {
                    return Err(format!("{} has already voted", e.voter));
                }
                let candidate = self
                    .candidates
                    .get_mut(&e.candidate_id)
                    .ok_or_else(|| format!("vote for unknown candidate {}", e.candidate_id))?;
                if candidate.is_deleted {
                    return Err(format!("vote for deleted candidate {}", e.candidate_id));
                }
                candidate.vote_count = candidate
                    .vote_count
                    .checked_add(1)
                    .ok_or_else(|| format!("vote count overflow for candidate {}", e.candidate_id))?;
                self.votes.insert(
                    e.voter.clone(),
                    VoteRecord {
                        election_id,
                        voter: e.voter.clone(),
                        candidate_id: e.candidate_id,
                        offset: raw.offset(),
                        tx_hash: raw.tx_hash.clone(),
                    },
                );
            }
            ElectionEvent::Paused(e) => {
                self.election.is_paused = e.is_paused;
            }
            // Dates of (0, 0) clear the schedule, as the ledger reads them.
            ElectionEvent::VotingDatesSet(e) if e.start_date == 0 && e.end_date == 0 => {
                self.election.window = None;
            }
            ElectionEvent::VotingDatesSet(e) => {
                let window = VotingWindow::new(e.start_date, e.end_date).ok_or_else(|| {
                    format!(
                        "start date {} is after end date {}",
                        e.start_date, e.end_date
                    )
                })?;
                self.election.window = Some(window);
            }
            ElectionEvent::Delegated(e) => {
                self.delegations.push(Delegation {
                    election_id,
                    from: e.from.clone(),
                    to: e.to.clone(),
                    offset: raw.offset(),
                });
            }
            ElectionEvent::OwnershipTransferStarted(_) | ElectionEvent::OwnershipTransferred(_) => {
                return Err("contract-wide event routed to an election".to_string());
            }
        }
        Ok(())
    }
}

/// Contract-wide state: the designated administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractProjector {
    owner: Option<Address>,
    pending_owner: Option<Address>,
    cursor: Cursor,
}

impl ContractProjector {
    pub fn owner(&self) -> Option<&Address> {
        self.owner.as_ref()
    }

    pub fn pending_owner(&self) -> Option<&Address> {
        self.pending_owner.as_ref()
    }

    pub fn cursor(&self) -> Option<EventOffset> {
        self.cursor.last
    }

    fn apply(&mut self, raw: &LedgerEvent, event: &ElectionEvent) -> ApplyOutcome {
        match self.cursor.admit(raw.offset(), || false) {
            Admission::Duplicate => return ApplyOutcome::Duplicate,
            Admission::Late => {
                return ApplyOutcome::Skipped(ProjectionWarning::new(
                    raw,
                    "arrived out of order",
                ))
            }
            Admission::New => {}
        }
        self.cursor.mark(raw.offset());
        match event {
            ElectionEvent::OwnershipTransferStarted(OwnershipChange { new_owner, .. }) => {
                self.pending_owner = Some(new_owner.clone());
            }
            ElectionEvent::OwnershipTransferred(OwnershipChange { new_owner, .. }) => {
                self.owner = Some(new_owner.clone());
                self.pending_owner = None;
            }
            _ => {
                return ApplyOutcome::Skipped(ProjectionWarning::new(
                    raw,
                    "election event routed to contract projection",
                ))
            }
        }
        ApplyOutcome::Applied
    }

    fn skip(&mut self, raw: &LedgerEvent, reason: String) -> ApplyOutcome {
        self.cursor.skip(raw, reason)
    }
}

/// Materialized view of the whole election contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    elections: BTreeMap<ElectionId, ElectionProjector>,
    contract: ContractProjector,
    warnings: Vec<ProjectionWarning>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn election(&self, election_id: ElectionId) -> Option<&ElectionProjector> {
        self.elections.get(&election_id)
    }

    pub fn elections(&self) -> impl Iterator<Item = &ElectionProjector> {
        self.elections.values()
    }

    pub fn contract(&self) -> &ContractProjector {
        &self.contract
    }

    pub fn warnings(&self) -> &[ProjectionWarning] {
        &self.warnings
    }

    pub fn state(&self, election_id: ElectionId) -> ProjectorState {
        self.election(election_id)
            .map_or(ProjectorState::Uninitialized, ElectionProjector::state)
    }

    /// Applies a backlog. The batch is sorted by offset first; a batch that
    /// was not delivered in order is reported as reordered.
    pub fn apply_backlog(&mut self, mut events: Vec<LedgerEvent>) -> BatchReport {
        let mut report = BatchReport {
            reordered: !events.windows(2).all(|w| w[0].offset() <= w[1].offset()),
            ..BatchReport::default()
        };
        if report.reordered {
            warn!("Event batch of {} was delivered out of order; sorting by offset", events.len());
            events.sort_by_key(LedgerEvent::offset);
        }

        let mut touched = BTreeSet::new();
        for event in &events {
            if let Some(election_id) = event.routed_election_id() {
                self.elections
                    .entry(election_id)
                    .or_insert_with(|| ElectionProjector::new(election_id))
                    .begin_catch_up();
                touched.insert(election_id);
            }
            let outcome = self.apply(event);
            report.record(outcome);
        }
        for election_id in touched {
            if let Some(projector) = self.elections.get_mut(&election_id) {
                projector.go_live();
            }
        }

        debug!(
            "Applied backlog: applied={} duplicates={} skipped={}",
            report.applied,
            report.duplicates,
            report.skipped.len()
        );
        report
    }

    /// Applies a single event. Never fails: malformed events become warnings.
    pub fn apply(&mut self, raw: &LedgerEvent) -> ApplyOutcome {
        let outcome = match raw.decode() {
            Ok(event) => match event.election_id() {
                Some(election_id) => self
                    .elections
                    .entry(election_id)
                    .or_insert_with(|| ElectionProjector::new(election_id))
                    .apply(raw, &event),
                None => self.contract.apply(raw, &event),
            },
            Err(err) => {
                let reason = match err {
                    ElectionError::MalformedEvent { reason, .. } => reason,
                    other => other.to_string(),
                };
                match raw.routed_election_id() {
                    Some(election_id) => self
                        .elections
                        .entry(election_id)
                        .or_insert_with(|| ElectionProjector::new(election_id))
                        .skip(raw, reason),
                    None => self.contract.skip(raw, reason),
                }
            }
        };

        if let ApplyOutcome::Skipped(warning) = &outcome {
            warn!(
                "Skipping {} event at {} (tx {}): {}",
                warning.kind, warning.offset, warning.tx_hash, warning.reason
            );
            self.warnings.push(warning.clone());
        }
        outcome
    }

    pub fn snapshot(&self, election_id: ElectionId) -> Option<ElectionSnapshot> {
        self.election(election_id).map(ElectionProjector::snapshot)
    }

    pub fn active_candidates(&self, election_id: ElectionId) -> Option<Vec<Candidate>> {
        self.election(election_id)
            .map(ElectionProjector::active_candidates)
    }

    pub fn ranking(&self, election_id: ElectionId) -> Option<Ranking> {
        self.election(election_id).map(ElectionProjector::ranking)
    }

    pub fn winner(&self, election_id: ElectionId) -> Option<WinnerResolution> {
        self.election(election_id).map(ElectionProjector::winner)
    }

    /// Unknown elections are never open for voting.
    pub fn can_actor_vote(&self, election_id: ElectionId, actor: &Address, now: Timestamp) -> bool {
        self.election(election_id)
            .is_some_and(|p| p.can_actor_vote(actor, now))
    }
}
