use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use election_core::projector::BatchReport;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum IngestOutcome {
    Success,
    BadRequest,
    Unauthorized,
    Internal,
}

impl IngestOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Success => "success",
            IngestOutcome::BadRequest => "bad_request",
            IngestOutcome::Unauthorized => "unauthorized",
            IngestOutcome::Internal => "internal",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NotFoundKind {
    Election,
    Candidate,
}

#[derive(Default)]
pub struct Metrics {
    ingest_total: HashMap<IngestOutcome, u64>,
    events_applied: u64,
    events_duplicate: u64,
    events_skipped: u64,
    batches_reordered: u64,
    not_found_total: HashMap<NotFoundKind, u64>,
}

static METRICS: OnceCell<Mutex<Metrics>> = OnceCell::new();

fn get() -> MutexGuard<'static, Metrics> {
    let m = METRICS.get_or_init(|| Mutex::new(Metrics::default()));
    // Counters stay usable even if a holder panicked mid-update.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn record_ingest_outcome(outcome: IngestOutcome) {
    *get().ingest_total.entry(outcome).or_insert(0) += 1;
}

pub fn record_batch(report: &BatchReport) {
    let mut m = get();
    m.events_applied += report.applied as u64;
    m.events_duplicate += report.duplicates as u64;
    m.events_skipped += report.skipped.len() as u64;
    if report.reordered {
        m.batches_reordered += 1;
    }
}

pub fn record_not_found(kind: NotFoundKind) {
    *get().not_found_total.entry(kind).or_insert(0) += 1;
}

pub fn snapshot_as_json(db_path: &str) -> Value {
    let m = get();

    let ingest: Vec<Value> = m
        .ingest_total
        .iter()
        .map(|(outcome, count)| json!({ "outcome": outcome.as_str(), "count": count }))
        .collect();

    let not_found: Vec<Value> = m
        .not_found_total
        .iter()
        .map(|(kind, count)| {
            json!({
                "kind": match kind {
                    NotFoundKind::Election => "election",
                    NotFoundKind::Candidate => "candidate",
                },
                "count": count
            })
        })
        .collect();

    let db_bytes = std::fs::metadata(db_path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len());

    json!({
        "ingest_total": ingest,
        "events_total": {
            "applied": m.events_applied,
            "duplicate": m.events_duplicate,
            "skipped": m.events_skipped,
        },
        "batches_reordered": m.batches_reordered,
        "not_found_total": not_found,
        "storage": {
            "db_path": db_path,
            "db_size_mb": db_bytes.map(|b| round2(b as f64 / (1024.0 * 1024.0))),
        }
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
