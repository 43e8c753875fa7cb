//! POST /events

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info, warn};

use crate::indexer::ingest_batch;
use crate::metrics::{self, IngestOutcome};
use crate::state::AppState;
use crate::types::{EventsRequest, EventsResponse};

/// Applies a batch of ledger events. The batch is sorted by offset, applied,
/// persisted in one transaction and only then made visible to queries.
pub async fn handle_events(
    State(app_state): State<AppState>,
    body: Result<Json<EventsRequest>, JsonRejection>,
) -> Result<Json<EventsResponse>, StatusCode> {
    let Json(request) = body.map_err(|rejection| {
        info!("POST /events - rejected body: {}", rejection.body_text());
        metrics::record_ingest_outcome(IngestOutcome::BadRequest);
        rejection.status()
    })?;

    let count = request.events.len();
    info!("POST /events - ingesting {} events", count);

    let mut projection = app_state.projection.write().await;
    let (next, report) = ingest_batch(&app_state.db, &projection, request.events)
        .await
        .map_err(|e| {
            error!("Failed to persist event batch: {:#}", e);
            metrics::record_ingest_outcome(IngestOutcome::Internal);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    *projection = next;
    drop(projection);

    if !report.skipped.is_empty() {
        warn!(
            "Batch of {} events: {} skipped",
            count,
            report.skipped.len()
        );
    }
    info!(
        "Batch of {} events: applied={} duplicates={} reordered={}",
        count, report.applied, report.duplicates, report.reordered
    );

    metrics::record_batch(&report);
    metrics::record_ingest_outcome(IngestOutcome::Success);

    Ok(Json(EventsResponse::from(report)))
}
