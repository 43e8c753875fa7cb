//! Ledger writes on behalf of an actor.
//!
//! Every write is checked locally before it is submitted. Once a write is
//! submitted, the running scheduler is asked to refresh, so the published view
//! follows what the ledger actually accepted. This also happens after a
//! rejection. Failed writes are never retried here.
//!
//! Admin writes are allowed only for the contract owner carried by the latest
//! view, so an ownership transfer takes effect with the next refresh.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::eligibility::can_vote;
use crate::error::{ElectionError, Result};
use crate::ledger::{LedgerClient, NewCandidate, TxReceipt};
use crate::scheduler::RefreshController;
use crate::state::{Address, CandidateId, ElectionId, Timestamp};

pub struct ElectionActions<L: ?Sized> {
    election_id: ElectionId,
    ledger: Arc<L>,
    refresh: RefreshController,
    voted: Mutex<HashMap<Address, bool>>,
}

impl<L: LedgerClient + ?Sized> ElectionActions<L> {
    pub fn new(ledger: Arc<L>, refresh: RefreshController) -> Self {
        Self {
            election_id: refresh.election_id(),
            ledger,
            refresh,
            voted: Mutex::new(HashMap::new()),
        }
    }

    pub fn election_id(&self) -> ElectionId {
        self.election_id
    }

    /// Owner from the latest view; `None` before the first refresh.
    pub fn administrator(&self) -> Option<Address> {
        self.refresh.latest().and_then(|v| v.administrator.clone())
    }

    /// Evaluates the gate against the latest published view. A ledger failure
    /// while looking up the actor's vote reads as "not eligible".
    pub async fn can_actor_vote(&self, actor: &Address, now: Timestamp) -> bool {
        match self.has_voted(actor).await {
            Ok(voted) => self.gate(voted, now),
            Err(e) => {
                warn!("Could not determine vote status for {}: {}", actor, e);
                false
            }
        }
    }

    pub async fn cast_vote(
        &self,
        actor: &Address,
        candidate_id: CandidateId,
        now: Timestamp,
    ) -> Result<TxReceipt> {
        let voted = self.has_voted(actor).await?;
        if !self.gate(voted, now) {
            return Err(ElectionError::IneligibleVote {
                election_id: self.election_id,
                actor: actor.clone(),
            });
        }

        match self
            .ledger
            .submit_vote(self.election_id, actor, candidate_id)
            .await
        {
            Ok(receipt) => {
                self.voted.lock().await.insert(actor.clone(), true);
                info!(
                    "Vote by {} for candidate {} in election {} landed in block {}",
                    actor, candidate_id, self.election_id, receipt.block_number
                );
                self.refresh.request_refresh();
                Ok(receipt)
            }
            Err(ElectionError::WriteRejected(reason)) => {
                warn!(
                    "Vote by {} in election {} rejected: {}",
                    actor, self.election_id, reason
                );
                self.voted.lock().await.remove(actor);
                self.refresh.request_refresh();
                Err(ElectionError::WriteRejected(reason))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn add_candidate(&self, actor: &Address, candidate: NewCandidate) -> Result<TxReceipt> {
        self.require_admin(actor)?;
        let result = self
            .ledger
            .submit_add_candidate(self.election_id, actor, candidate)
            .await;
        self.after_admin_write("add_candidate", result)
    }

    pub async fn delete_candidate(&self, actor: &Address, candidate_id: CandidateId) -> Result<TxReceipt> {
        self.require_admin(actor)?;
        let result = self
            .ledger
            .submit_delete_candidate(self.election_id, actor, candidate_id)
            .await;
        self.after_admin_write("delete_candidate", result)
    }

    pub async fn set_dates(
        &self,
        actor: &Address,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<TxReceipt> {
        self.require_admin(actor)?;
        let result = self
            .ledger
            .submit_set_dates(self.election_id, actor, start_time, end_time)
            .await;
        self.after_admin_write("set_dates", result)
    }

    pub async fn toggle_pause(&self, actor: &Address) -> Result<TxReceipt> {
        self.require_admin(actor)?;
        let result = self
            .ledger
            .submit_toggle_pause(self.election_id, actor)
            .await;
        self.after_admin_write("toggle_pause", result)
    }

    fn gate(&self, actor_has_voted: bool, now: Timestamp) -> bool {
        let view = self.refresh.latest();
        can_vote(view.as_ref().map(|v| &v.snapshot), actor_has_voted, now)
    }

    async fn has_voted(&self, actor: &Address) -> Result<bool> {
        if let Some(voted) = self.voted.lock().await.get(actor) {
            return Ok(*voted);
        }
        let voted = self.ledger.check_voted(self.election_id, actor).await?;
        self.voted.lock().await.insert(actor.clone(), voted);
        Ok(voted)
    }

    /// A denied actor also triggers a refresh, in case ownership moved.
    fn require_admin(&self, actor: &Address) -> Result<()> {
        if self.administrator().as_ref() != Some(actor) {
            self.refresh.request_refresh();
            return Err(ElectionError::AccessDenied {
                actor: actor.clone(),
            });
        }
        Ok(())
    }

    fn after_admin_write(&self, action: &str, result: Result<TxReceipt>) -> Result<TxReceipt> {
        match &result {
            Ok(receipt) => info!(
                "{} on election {} landed in block {}",
                action, self.election_id, receipt.block_number
            ),
            Err(e @ ElectionError::WriteRejected(_)) => {
                warn!("{} on election {} rejected: {}", action, self.election_id, e)
            }
            Err(_) => return result,
        }
        self.refresh.request_refresh();
        result
    }
}
