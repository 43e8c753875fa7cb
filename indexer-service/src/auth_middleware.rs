//! Authentication for the ingest and admin endpoints

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::metrics::{self, IngestOutcome};
use crate::state::AppState;

/// Requires `Authorization: Bearer <INGEST_AUTH_TOKEN>`.
pub async fn ingest_auth(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = app_state.config.ingest_auth_token.as_deref() else {
        info!("Rejecting ingest: INGEST_AUTH_TOKEN is not configured");
        metrics::record_ingest_outcome(IngestOutcome::Unauthorized);
        return Err(StatusCode::UNAUTHORIZED);
    };

    let token = extract_bearer_token(&headers).inspect_err(|_| {
        metrics::record_ingest_outcome(IngestOutcome::Unauthorized);
    })?;

    if token != expected {
        info!("Rejecting ingest: invalid bearer token");
        metrics::record_ingest_outcome(IngestOutcome::Unauthorized);
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

/// Requires `x-metrics-token: <METRICS_AUTH_TOKEN>`.
pub fn require_metrics_token(app_state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let expected = app_state
        .config
        .metrics_auth_token
        .as_deref()
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let provided = headers
        .get("x-metrics-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if provided != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let auth_header = headers
        .get("authorization")
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::BAD_REQUEST)
}
