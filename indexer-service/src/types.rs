//! Types for HTTP requests and responses

use election_core::projector::{BatchReport, ProjectionWarning};
use election_core::state::{LedgerEvent, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct EventsRequest {
    pub events: Vec<LedgerEvent>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub applied: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub reordered: bool,
    pub warnings: Vec<ProjectionWarning>,
}

impl From<BatchReport> for EventsResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            applied: report.applied,
            duplicates: report.duplicates,
            skipped: report.skipped.len(),
            reordered: report.reordered,
            warnings: report.skipped,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EligibilityQuery {
    pub now: Option<Timestamp>,
}
