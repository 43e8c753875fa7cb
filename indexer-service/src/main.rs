mod auth_middleware;
mod config;
mod database;
mod indexer;
mod ingest;
mod metrics;
mod queries;
mod state;
mod types;
mod utils;

use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServiceConfig;
use crate::database::Database;
use crate::indexer::rebuild_projection;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting election indexer service");

    let config = ServiceConfig::from_env();
    if config.ingest_auth_token.is_none() {
        warn!("INGEST_AUTH_TOKEN is not set; POST /events will reject every request");
    }

    let db = Database::connect(&config.db_path).await?;
    info!("Database initialized successfully");

    let projection = rebuild_projection(&db).await?;
    let port = config.port;
    let app = app(AppState::new(db, projection, config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn app(state: AppState) -> Router {
    let body_limit = state.config.events_body_limit;

    let ingest = Router::new()
        .route("/events", post(ingest::handle_events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::ingest_auth,
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit));

    Router::new()
        .route("/healthz", get(queries::health_check))
        .route("/meta", get(queries::get_meta))
        .route("/admin/stats", get(queries::get_stats))
        .route("/elections/{id}/candidates", get(queries::get_candidates))
        .route(
            "/elections/{id}/candidates/{candidate_id}",
            get(queries::get_candidate),
        )
        .route("/elections/{id}/ranking", get(queries::get_ranking))
        .route("/elections/{id}/winner", get(queries::get_winner))
        .route(
            "/elections/{id}/voters/{actor}/eligibility",
            get(queries::get_eligibility),
        )
        .merge(ingest)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
