//! Event ingestion and projection persistence

use std::collections::{BTreeSet, HashSet};

use anyhow::{Context, Result};
use election_core::projector::{BatchReport, Projection};
use election_core::state::{Address, CandidateId, ElectionEvent, ElectionId, EventOffset, LedgerEvent};
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info};

use crate::database::constants::{OUTCOME_APPLIED, OUTCOME_SKIPPED};
use crate::database::models::LedgerEventRecord;
use crate::database::operations::{
    insert_delegation, insert_vote_record, insert_warning, replace_contract_owner,
    upsert_candidate, upsert_election,
};
use crate::database::Database;

/// Entity rows a batch may have changed.
#[derive(Debug, Default)]
struct TouchedRows {
    elections: BTreeSet<ElectionId>,
    candidates: BTreeSet<(ElectionId, CandidateId)>,
    voters: BTreeSet<(ElectionId, Address)>,
    delegations: BTreeSet<(ElectionId, EventOffset)>,
    contract: bool,
}

impl TouchedRows {
    /// Skipped events still move an election's cursor but change no entity.
    fn collect(events: &[LedgerEvent], skipped: &HashSet<EventOffset>) -> Self {
        let mut rows = Self::default();
        for event in events {
            let Some(election_id) = event.routed_election_id() else {
                rows.contract = true;
                continue;
            };
            rows.elections.insert(election_id);
            if skipped.contains(&event.offset()) {
                continue;
            }
            match event.decode() {
                Ok(ElectionEvent::CandidateAdded(e)) => {
                    rows.candidates.insert((election_id, e.id));
                }
                Ok(ElectionEvent::CandidateDeleted(e)) => {
                    rows.candidates.insert((election_id, e.id));
                }
                Ok(ElectionEvent::Voted(e)) => {
                    rows.candidates.insert((election_id, e.candidate_id));
                    rows.voters.insert((election_id, e.voter));
                }
                Ok(ElectionEvent::Delegated(_)) => {
                    rows.delegations.insert((election_id, event.offset()));
                }
                _ => {}
            }
        }
        rows
    }

    async fn persist(&self, conn: &mut SqliteConnection, projection: &Projection) -> Result<()> {
        for election_id in &self.elections {
            if let Some(projector) = projection.election(*election_id) {
                upsert_election(&mut *conn, projector).await?;
            }
        }
        for (election_id, candidate_id) in &self.candidates {
            if let Some(candidate) = projection
                .election(*election_id)
                .and_then(|p| p.candidate(*candidate_id))
            {
                upsert_candidate(&mut *conn, candidate).await?;
            }
        }
        for (election_id, voter) in &self.voters {
            if let Some(record) = projection
                .election(*election_id)
                .and_then(|p| p.vote_record(voter))
            {
                insert_vote_record(&mut *conn, record).await?;
            }
        }
        for (election_id, offset) in &self.delegations {
            if let Some(delegation) = projection
                .election(*election_id)
                .and_then(|p| p.delegation_at(*offset))
            {
                insert_delegation(&mut *conn, delegation).await?;
            }
        }
        if self.contract {
            replace_contract_owner(&mut *conn, projection.contract()).await?;
        }
        Ok(())
    }
}

/// Applies `events` to a copy of `current`, persists the outcome in one
/// transaction and returns the new projection. `current` is left untouched
/// when persistence fails.
pub async fn ingest_batch(
    db: &Database,
    current: &Projection,
    events: Vec<LedgerEvent>,
) -> Result<(Projection, BatchReport)> {
    let mut next = current.clone();
    let report = next.apply_backlog(events.clone());

    let skipped: HashSet<EventOffset> = report.skipped.iter().map(|w| w.offset).collect();
    let touched = TouchedRows::collect(&events, &skipped);
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = db.pool().begin().await?;
    let batch_seq = LedgerEventRecord::next_batch_seq(&mut tx).await?;

    for event in &events {
        let outcome = if skipped.contains(&event.offset()) {
            OUTCOME_SKIPPED
        } else {
            OUTCOME_APPLIED
        };
        LedgerEventRecord::new(event, outcome, batch_seq, &now)?
            .insert(&mut tx)
            .await
            .with_context(|| format!("storing event at {}", event.offset()))?;
    }

    for warning in &report.skipped {
        insert_warning(&mut tx, warning, &now).await?;
    }

    touched.persist(&mut tx, &next).await?;

    tx.commit().await?;

    debug!(
        "Persisted batch {} touching {} elections, {} candidates and {} vote records",
        batch_seq,
        touched.elections.len(),
        touched.candidates.len(),
        touched.voters.len()
    );

    Ok((next, report))
}

/// Rebuilds the in-memory projection by replaying every stored event, batch
/// by batch in the order they were received. Skipped events are replayed too,
/// so the cursors come back exactly where they were.
pub async fn rebuild_projection(db: &Database) -> Result<Projection> {
    let records = LedgerEventRecord::load_in_receipt_order(db.pool()).await?;

    let mut projection = Projection::new();
    if records.is_empty() {
        info!("No stored events; starting with an empty projection");
        return Ok(projection);
    }

    let count = records.len();
    let mut batches: Vec<(u64, Vec<LedgerEvent>)> = Vec::new();
    for record in records {
        let batch_seq = record.batch_seq;
        let event = record
            .into_ledger_event()
            .context("stored event payload is not valid JSON")?;
        match batches.last_mut() {
            Some((seq, batch)) if *seq == batch_seq => batch.push(event),
            _ => batches.push((batch_seq, vec![event])),
        }
    }

    let batch_count = batches.len();
    let mut skipped = 0;
    for (_, batch) in batches {
        skipped += projection.apply_backlog(batch).skipped.len();
    }
    info!(
        "Rebuilt projection from {} stored events in {} batches ({} elections, {} skipped)",
        count,
        batch_count,
        projection.elections().count(),
        skipped
    );

    Ok(projection)
}
