use anyhow::Result;
use election_core::projector::{ContractProjector, ElectionProjector, ProjectionWarning};
use election_core::state::{Candidate, Delegation, VoteRecord};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;

use super::models::LedgerEventRecord;

// SQLite integers are signed; offsets, ids and counts are stored as i64.
fn to_db(v: u64) -> i64 {
    v as i64
}

fn from_db(v: i64) -> u64 {
    v as u64
}

/// Database operations for the raw event log
impl LedgerEventRecord {
    /// Inserts the event unless its offset is already stored.
    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO ledger_events
             (block_number, log_index, tx_hash, kind, payload, outcome, batch_seq, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(to_db(self.block_number))
        .bind(to_db(self.log_index))
        .bind(&self.tx_hash)
        .bind(&self.kind)
        .bind(&self.payload)
        .bind(&self.outcome)
        .bind(to_db(self.batch_seq))
        .bind(&self.received_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Every stored event, skipped ones included, batch by batch and in
    /// offset order within a batch.
    pub async fn load_in_receipt_order(pool: &SqlitePool) -> Result<Vec<LedgerEventRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM ledger_events ORDER BY batch_seq, block_number, log_index",
        )
        .fetch_all(pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    pub async fn next_batch_seq(conn: &mut SqliteConnection) -> Result<u64> {
        let last: Option<i64> = sqlx::query_scalar("SELECT MAX(batch_seq) FROM ledger_events")
            .fetch_one(conn)
            .await?;
        Ok(last.map_or(1, |seq| from_db(seq) + 1))
    }

    pub async fn count(pool: &SqlitePool) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_events")
            .fetch_one(pool)
            .await?;
        Ok(from_db(count))
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(LedgerEventRecord {
            block_number: from_db(row.try_get("block_number")?),
            log_index: from_db(row.try_get("log_index")?),
            tx_hash: row.try_get("tx_hash")?,
            kind: row.try_get("kind")?,
            payload: row.try_get("payload")?,
            outcome: row.try_get("outcome")?,
            batch_seq: from_db(row.try_get("batch_seq")?),
            received_at: row.try_get("received_at")?,
        })
    }
}

pub async fn insert_warning(
    conn: &mut SqliteConnection,
    warning: &ProjectionWarning,
    recorded_at: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO projection_warnings
         (block_number, log_index, tx_hash, kind, reason, recorded_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(to_db(warning.offset.block_number))
    .bind(to_db(warning.offset.log_index))
    .bind(&warning.tx_hash)
    .bind(&warning.kind)
    .bind(&warning.reason)
    .bind(recorded_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn count_warnings(pool: &SqlitePool) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projection_warnings")
        .fetch_one(pool)
        .await?;
    Ok(from_db(count))
}

/// Upserts the election row, including its cursor and state.
pub async fn upsert_election(conn: &mut SqliteConnection, projector: &ElectionProjector) -> Result<()> {
    let election = projector.election();
    let cursor = projector.cursor();
    let state = serde_json::to_value(projector.state())?
        .as_str()
        .unwrap_or_default()
        .to_string();
    sqlx::query(
        "INSERT OR REPLACE INTO elections
         (election_id, start_time, end_time, is_paused, cursor_block, cursor_log, state)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(to_db(election.id))
    .bind(election.window.map(|w| to_db(w.start_time)))
    .bind(election.window.map(|w| to_db(w.end_time)))
    .bind(election.is_paused)
    .bind(cursor.map(|c| to_db(c.block_number)))
    .bind(cursor.map(|c| to_db(c.log_index)))
    .bind(state)
    .execute(conn)
    .await?;

    Ok(())
}

/// Only the tally and the deletion flag change after a candidate is added.
pub async fn upsert_candidate(conn: &mut SqliteConnection, candidate: &Candidate) -> Result<()> {
    sqlx::query(
        "INSERT INTO candidates
         (election_id, candidate_id, name, party, metadata_uri, vote_count, is_deleted)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (election_id, candidate_id)
         DO UPDATE SET vote_count = excluded.vote_count, is_deleted = excluded.is_deleted",
    )
    .bind(to_db(candidate.election_id))
    .bind(to_db(candidate.id))
    .bind(&candidate.name)
    .bind(&candidate.party)
    .bind(&candidate.metadata_uri)
    .bind(to_db(candidate.vote_count))
    .bind(candidate.is_deleted)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn insert_vote_record(conn: &mut SqliteConnection, record: &VoteRecord) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO vote_records
         (election_id, voter, candidate_id, block_number, log_index, tx_hash)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(to_db(record.election_id))
    .bind(record.voter.as_str())
    .bind(to_db(record.candidate_id))
    .bind(to_db(record.offset.block_number))
    .bind(to_db(record.offset.log_index))
    .bind(&record.tx_hash)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn insert_delegation(conn: &mut SqliteConnection, delegation: &Delegation) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO delegations
         (election_id, from_address, to_address, block_number, log_index)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(to_db(delegation.election_id))
    .bind(delegation.from.as_str())
    .bind(delegation.to.as_str())
    .bind(to_db(delegation.offset.block_number))
    .bind(to_db(delegation.offset.log_index))
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn replace_contract_owner(conn: &mut SqliteConnection, contract: &ContractProjector) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO contract_owner (id, owner, pending_owner) VALUES (1, ?, ?)")
        .bind(contract.owner().map(|a| a.as_str().to_string()))
        .bind(contract.pending_owner().map(|a| a.as_str().to_string()))
        .execute(conn)
        .await?;
    Ok(())
}

/// Rows per entity table, keyed by table name.
pub async fn table_counts(pool: &SqlitePool) -> Result<Vec<(&'static str, u64)>> {
    let mut counts = Vec::new();
    for table in ["elections", "candidates", "vote_records", "delegations"] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
        counts.push((table, from_db(count)));
    }
    Ok(counts)
}
