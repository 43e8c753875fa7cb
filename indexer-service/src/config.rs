//! Service configuration from the environment

use crate::database::constants::DEFAULT_DB_PATH;
use crate::utils::{env_opt, env_parse};

pub const DEFAULT_PORT: u16 = 3000;
/// 16 MiB of JSON per `/events` request
pub const DEFAULT_EVENTS_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub db_path: String,
    pub port: u16,
    /// `/events` rejects every request while unset
    pub ingest_auth_token: Option<String>,
    /// `/admin/stats` rejects every request while unset
    pub metrics_auth_token: Option<String>,
    pub events_body_limit: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: env_opt("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            port: env_parse("PORT", DEFAULT_PORT),
            ingest_auth_token: env_opt("INGEST_AUTH_TOKEN"),
            metrics_auth_token: env_opt("METRICS_AUTH_TOKEN"),
            events_body_limit: env_parse("EVENTS_BODY_LIMIT", DEFAULT_EVENTS_BODY_LIMIT),
        }
    }
}
