//! Database migration constants and metadata

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Migration descriptions, indexed by version - 1
pub const MIGRATION_DESCRIPTIONS: &[&str] = &[
    "Event log, election projection and warnings",
    "Ingest batch sequence on the event log",
];

/// Default database file name
pub const DEFAULT_DB_PATH: &str = "election.db";

/// Stored in `ledger_events.outcome`
pub const OUTCOME_APPLIED: &str = "applied";
pub const OUTCOME_SKIPPED: &str = "skipped";
