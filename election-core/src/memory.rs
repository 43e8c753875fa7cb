//! In-memory reference ledger.
//!
//! Mirrors the election contract: owner-gated admin writes, 1-based candidate
//! ids with soft deletion, one vote per actor per election, and an ordered
//! event log. Revert conditions are written out here separately from
//! [`crate::eligibility`] so the two can be checked against each other.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ElectionError, Result};
use crate::ledger::{CandidateRecord, ElectionParams, LedgerClient, NewCandidate, TxReceipt};
use crate::state::{
    Address, CandidateAdded, CandidateDeleted, CandidateId, ElectionEvent, ElectionId,
    EventOffset, LedgerEvent, OwnershipChange, Paused, Timestamp, Voted, VotingDatesSet,
};

#[derive(Default)]
struct ElectionEntry {
    start_time: Timestamp,
    end_time: Timestamp,
    is_paused: bool,
    candidates: Vec<CandidateRecord>,
    voters: HashSet<Address>,
}

struct Inner {
    owner: Address,
    now: Timestamp,
    block_number: u64,
    elections: BTreeMap<ElectionId, ElectionEntry>,
    events: Vec<LedgerEvent>,
}

pub struct MemoryLedger {
    inner: Mutex<Inner>,
    reads_down: AtomicBool,
    writes_down: AtomicBool,
    read_delay_ms: AtomicU64,
    reads: AtomicU64,
}

impl MemoryLedger {
    /// Deploys the contract to `owner`. Deployment is block 1 and emits
    /// `OwnershipTransferred` from the zero address.
    pub fn new(owner: Address) -> Self {
        let deployed = ElectionEvent::OwnershipTransferred(OwnershipChange {
            previous_owner: Address::zero(),
            new_owner: owner.clone(),
        })
        .into_ledger_event(EventOffset::new(1, 0), format!("0x{:064x}", 1));
        Self {
            inner: Mutex::new(Inner {
                owner,
                now: 0,
                block_number: 1,
                elections: BTreeMap::new(),
                events: vec![deployed],
            }),
            reads_down: AtomicBool::new(false),
            writes_down: AtomicBool::new(false),
            read_delay_ms: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// Sets the block timestamp used for vote window checks.
    pub fn set_time(&self, now: Timestamp) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.now = now;
        }
    }

    /// Makes every read fail with `LedgerUnavailable` while `down` is set.
    pub fn set_reads_down(&self, down: bool) {
        self.reads_down.store(down, Ordering::SeqCst);
    }

    pub fn set_writes_down(&self, down: bool) {
        self.writes_down.store(down, Ordering::SeqCst);
    }

    /// Delays every read, to keep reads in flight.
    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.lock().map(|inner| inner.events.clone()).unwrap_or_default()
    }

    /// Hands ownership to `new_owner`, emitting both ownership events.
    pub fn transfer_ownership(&self, actor: &Address, new_owner: Address) -> Result<TxReceipt> {
        self.write(|inner| {
            require_owner(inner, actor)?;
            let change = OwnershipChange {
                previous_owner: inner.owner.clone(),
                new_owner: new_owner.clone(),
            };
            inner.owner = new_owner;
            Ok(vec![
                ElectionEvent::OwnershipTransferStarted(change.clone()),
                ElectionEvent::OwnershipTransferred(change),
            ])
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| ElectionError::LedgerUnavailable(format!("ledger state poisoned: {e}")))
    }

    async fn read<T>(&self, f: impl FnOnce(&Inner) -> Result<T>) -> Result<T> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.reads_down.load(Ordering::SeqCst) {
            return Err(ElectionError::LedgerUnavailable(
                "rpc endpoint unreachable".to_string(),
            ));
        }
        let inner = self.lock()?;
        f(&inner)
    }

    /// Runs a state transition in its own block. All emitted events share the
    /// block and get consecutive log indexes.
    fn write(
        &self,
        f: impl FnOnce(&mut Inner) -> Result<Vec<ElectionEvent>>,
    ) -> Result<TxReceipt> {
        if self.writes_down.load(Ordering::SeqCst) {
            return Err(ElectionError::LedgerUnavailable(
                "rpc endpoint unreachable".to_string(),
            ));
        }
        let mut inner = self.lock()?;
        let emitted = f(&mut inner)?;
        inner.block_number += 1;
        let block_number = inner.block_number;
        let tx_hash = format!("0x{:064x}", block_number);
        for (log_index, event) in emitted.into_iter().enumerate() {
            let offset = EventOffset::new(block_number, log_index as u64);
            inner
                .events
                .push(event.into_ledger_event(offset, tx_hash.clone()));
        }
        Ok(TxReceipt {
            tx_hash,
            block_number,
        })
    }
}

fn require_owner(inner: &Inner, actor: &Address) -> Result<()> {
    if *actor != inner.owner {
        return Err(ElectionError::WriteRejected(
            "Ownable: caller is not the owner".to_string(),
        ));
    }
    Ok(())
}

fn candidate_index(entry: &ElectionEntry, id: CandidateId) -> Result<usize> {
    let idx = (id as usize)
        .checked_sub(1)
        .filter(|idx| *idx < entry.candidates.len())
        .ok_or_else(|| ElectionError::WriteRejected("Invalid candidate".to_string()))?;
    if entry.candidates[idx].is_deleted {
        return Err(ElectionError::WriteRejected("Candidate deleted".to_string()));
    }
    Ok(idx)
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_owner(&self) -> Result<Address> {
        self.read(|inner| Ok(inner.owner.clone())).await
    }

    async fn get_election(&self, election_id: ElectionId) -> Result<ElectionParams> {
        self.read(|inner| {
            Ok(inner
                .elections
                .get(&election_id)
                .map(|e| ElectionParams {
                    start_time: e.start_time,
                    end_time: e.end_time,
                    is_paused: e.is_paused,
                })
                .unwrap_or_default())
        })
        .await
    }

    async fn get_active_candidate_count(&self, election_id: ElectionId) -> Result<u64> {
        self.read(|inner| {
            Ok(inner
                .elections
                .get(&election_id)
                .map_or(0, |e| e.candidates.len() as u64))
        })
        .await
    }

    async fn get_candidate(&self, election_id: ElectionId, id: CandidateId) -> Result<CandidateRecord> {
        self.read(|inner| {
            inner
                .elections
                .get(&election_id)
                .and_then(|e| (id as usize).checked_sub(1).and_then(|idx| e.candidates.get(idx)))
                .cloned()
                .ok_or_else(|| {
                    ElectionError::LedgerUnavailable(format!(
                        "candidate {} not found in election {}",
                        id, election_id
                    ))
                })
        })
        .await
    }

    async fn check_voted(&self, election_id: ElectionId, actor: &Address) -> Result<bool> {
        self.read(|inner| {
            Ok(inner
                .elections
                .get(&election_id)
                .is_some_and(|e| e.voters.contains(actor)))
        })
        .await
    }

    async fn submit_vote(
        &self,
        election_id: ElectionId,
        actor: &Address,
        candidate_id: CandidateId,
    ) -> Result<TxReceipt> {
        self.write(|inner| {
            let now = inner.now;
            let entry = inner.elections.entry(election_id).or_default();
            if entry.is_paused {
                return Err(ElectionError::WriteRejected("Voting is paused".to_string()));
            }
            let scheduled = !(entry.start_time == 0 && entry.end_time == 0);
            if !scheduled || now < entry.start_time || now > entry.end_time {
                return Err(ElectionError::WriteRejected("Voting is not active".to_string()));
            }
            if entry.voters.contains(actor) {
                return Err(ElectionError::WriteRejected("Already voted".to_string()));
            }
            let idx = candidate_index(entry, candidate_id)?;
            entry.candidates[idx].vote_count += 1;
            entry.voters.insert(actor.clone());
            Ok(vec![ElectionEvent::Voted(Voted {
                election_id,
                voter: actor.clone(),
                candidate_id,
            })])
        })
    }

    async fn submit_add_candidate(
        &self,
        election_id: ElectionId,
        actor: &Address,
        candidate: NewCandidate,
    ) -> Result<TxReceipt> {
        self.write(|inner| {
            require_owner(inner, actor)?;
            let entry = inner.elections.entry(election_id).or_default();
            entry.candidates.push(CandidateRecord {
                name: candidate.name.clone(),
                party: candidate.party.clone(),
                vote_count: 0,
                uri: candidate.uri.clone(),
                is_deleted: false,
            });
            Ok(vec![ElectionEvent::CandidateAdded(CandidateAdded {
                election_id,
                id: entry.candidates.len() as CandidateId,
                name: candidate.name,
                party: candidate.party,
                metadata_uri: candidate.uri,
            })])
        })
    }

    async fn submit_delete_candidate(
        &self,
        election_id: ElectionId,
        actor: &Address,
        candidate_id: CandidateId,
    ) -> Result<TxReceipt> {
        self.write(|inner| {
            require_owner(inner, actor)?;
            let entry = inner.elections.entry(election_id).or_default();
            let idx = candidate_index(entry, candidate_id)?;
            entry.candidates[idx].is_deleted = true;
            Ok(vec![ElectionEvent::CandidateDeleted(CandidateDeleted {
                election_id,
                id: candidate_id,
            })])
        })
    }

    async fn submit_set_dates(
        &self,
        election_id: ElectionId,
        actor: &Address,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<TxReceipt> {
        self.write(|inner| {
            require_owner(inner, actor)?;
            if start_time > end_time {
                return Err(ElectionError::WriteRejected(
                    "Start date must precede end date".to_string(),
                ));
            }
            let entry = inner.elections.entry(election_id).or_default();
            entry.start_time = start_time;
            entry.end_time = end_time;
            Ok(vec![ElectionEvent::VotingDatesSet(VotingDatesSet {
                election_id,
                start_date: start_time,
                end_date: end_time,
            })])
        })
    }

    async fn submit_toggle_pause(&self, election_id: ElectionId, actor: &Address) -> Result<TxReceipt> {
        self.write(|inner| {
            require_owner(inner, actor)?;
            let entry = inner.elections.entry(election_id).or_default();
            entry.is_paused = !entry.is_paused;
            Ok(vec![ElectionEvent::Paused(Paused {
                election_id,
                is_paused: entry.is_paused,
            })])
        })
    }

    async fn events_after(&self, cursor: Option<EventOffset>, limit: usize) -> Result<Vec<LedgerEvent>> {
        self.read(|inner| {
            Ok(inner
                .events
                .iter()
                .filter(|e| cursor.map_or(true, |c| e.offset() > c))
                .take(limit)
                .cloned()
                .collect())
        })
        .await
    }
}
