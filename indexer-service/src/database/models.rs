pub mod views;

use election_core::state::LedgerEvent;
use serde::{Deserialize, Serialize};

/// Row of `ledger_events`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEventRecord {
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
    pub kind: String,
    pub payload: String, // JSON object
    pub outcome: String,
    /// Ingest batch that first stored the event; replay runs batch by batch.
    pub batch_seq: u64,
    pub received_at: String, // ISO8601 UTC timestamp
}

impl LedgerEventRecord {
    pub fn new(
        event: &LedgerEvent,
        outcome: &str,
        batch_seq: u64,
        received_at: &str,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            block_number: event.block_number,
            log_index: event.log_index,
            tx_hash: event.tx_hash.clone(),
            kind: event.kind.clone(),
            payload: serde_json::to_string(&event.payload)?,
            outcome: outcome.to_string(),
            batch_seq,
            received_at: received_at.to_string(),
        })
    }

    pub fn into_ledger_event(self) -> serde_json::Result<LedgerEvent> {
        Ok(LedgerEvent {
            kind: self.kind,
            payload: serde_json::from_str(&self.payload)?,
            block_number: self.block_number,
            log_index: self.log_index,
            tx_hash: self.tx_hash,
        })
    }
}
