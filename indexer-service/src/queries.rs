//! Read endpoints over the in-memory projection

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use election_core::eligibility::voting_phase;
use election_core::projector::{ElectionProjector, Projection};
use election_core::state::{Candidate, CandidateId, ElectionId, Timestamp};
use election_core::tally::Ranking;
use election_core::winner::WinnerResolution;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth_middleware::require_metrics_token;
use crate::database::migrator::get_current_version;
use crate::database::models::views::{ElectionMeta, EligibilityView};
use crate::database::models::LedgerEventRecord;
use crate::database::operations::{count_warnings, table_counts};
use crate::metrics::{self, NotFoundKind};
use crate::state::AppState;
use crate::types::EligibilityQuery;
use crate::utils::parse_address;

fn election(projection: &Projection, election_id: ElectionId) -> Result<&ElectionProjector, StatusCode> {
    projection.election(election_id).ok_or_else(|| {
        info!("Election {} not found", election_id);
        metrics::record_not_found(NotFoundKind::Election);
        StatusCode::NOT_FOUND
    })
}

fn internal(e: anyhow::Error) -> StatusCode {
    error!("Database error: {:#}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// GET /meta
pub async fn get_meta(State(app_state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    info!("GET /meta");
    let schema_version = get_current_version(app_state.db.pool())
        .await
        .map_err(internal)?;
    let stored_events = LedgerEventRecord::count(app_state.db.pool())
        .await
        .map_err(internal)?;

    let projection = app_state.projection.read().await;
    let elections: Vec<ElectionMeta> = projection
        .elections()
        .map(|p| ElectionMeta {
            election_id: p.election().id,
            state: p.state(),
            cursor: p.cursor(),
            candidates: p.active_candidates().len(),
            votes_recorded: p.vote_records().count(),
        })
        .collect();

    Ok(Json(json!({
        "build": {
            "git_hash": env!("INDEXER_BUILD_GIT_HASH"),
            "built_at_unix": env!("INDEXER_BUILD_TIME_UNIX"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "schema_version": schema_version,
        "stored_events": stored_events,
        "owner": projection.contract().owner(),
        "pending_owner": projection.contract().pending_owner(),
        "elections": elections,
    })))
}

/// GET /elections/{id}/candidates
pub async fn get_candidates(
    State(app_state): State<AppState>,
    Path(election_id): Path<ElectionId>,
) -> Result<Json<Vec<Candidate>>, StatusCode> {
    info!("GET /elections/{}/candidates", election_id);
    let projection = app_state.projection.read().await;
    Ok(Json(election(&projection, election_id)?.active_candidates()))
}

/// GET /elections/{id}/candidates/{candidate_id}, soft-deleted included
pub async fn get_candidate(
    State(app_state): State<AppState>,
    Path((election_id, candidate_id)): Path<(ElectionId, CandidateId)>,
) -> Result<Json<Candidate>, StatusCode> {
    info!("GET /elections/{}/candidates/{}", election_id, candidate_id);
    let projection = app_state.projection.read().await;
    election(&projection, election_id)?
        .candidate(candidate_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            metrics::record_not_found(NotFoundKind::Candidate);
            StatusCode::NOT_FOUND
        })
}

/// GET /elections/{id}/ranking
pub async fn get_ranking(
    State(app_state): State<AppState>,
    Path(election_id): Path<ElectionId>,
) -> Result<Json<Ranking>, StatusCode> {
    info!("GET /elections/{}/ranking", election_id);
    let projection = app_state.projection.read().await;
    Ok(Json(election(&projection, election_id)?.ranking()))
}

/// GET /elections/{id}/winner
pub async fn get_winner(
    State(app_state): State<AppState>,
    Path(election_id): Path<ElectionId>,
) -> Result<Json<WinnerResolution>, StatusCode> {
    info!("GET /elections/{}/winner", election_id);
    let projection = app_state.projection.read().await;
    Ok(Json(election(&projection, election_id)?.winner()))
}

/// GET /elections/{id}/voters/{actor}/eligibility?now=
pub async fn get_eligibility(
    State(app_state): State<AppState>,
    Path((election_id, actor)): Path<(ElectionId, String)>,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<EligibilityView>, StatusCode> {
    info!("GET /elections/{}/voters/{}/eligibility", election_id, actor);
    let actor = parse_address(&actor)?;
    let now = query.now.unwrap_or_else(server_now);

    let projection = app_state.projection.read().await;
    let projector = election(&projection, election_id)?;

    Ok(Json(EligibilityView {
        election_id,
        now,
        eligible: projector.can_actor_vote(&actor, now),
        has_voted: projector.has_voted(&actor),
        is_paused: projector.election().is_paused,
        phase: voting_phase(projector.election(), now),
        actor,
    }))
}

/// GET /admin/stats
pub async fn get_stats(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    require_metrics_token(&app_state, &headers)?;

    let mut stats = metrics::snapshot_as_json(&app_state.config.db_path);
    let tables = table_counts(app_state.db.pool()).await.map_err(internal)?;
    let warnings = count_warnings(app_state.db.pool()).await.map_err(internal)?;

    let mut rows = serde_json::Map::new();
    for (table, count) in tables {
        rows.insert(table.to_string(), json!(count));
    }
    rows.insert("projection_warnings".to_string(), json!(warnings));
    stats["rows"] = Value::Object(rows);

    Ok(Json(stats))
}

fn server_now() -> Timestamp {
    chrono::Utc::now().timestamp().max(0) as Timestamp
}
