//! SQL statement constants for database operations

pub const CREATE_MIGRATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT NOT NULL
)
"#;

pub const CREATE_LEDGER_EVENTS_TABLE_SQL: &str = r#"
CREATE TABLE ledger_events (
    block_number INTEGER NOT NULL,
    log_index INTEGER NOT NULL,
    tx_hash TEXT NOT NULL,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL, -- json
    outcome TEXT NOT NULL,
    received_at TEXT NOT NULL,
    PRIMARY KEY (block_number, log_index)
)
"#;

pub const CREATE_ELECTIONS_TABLE_SQL: &str = r#"
CREATE TABLE elections (
    election_id INTEGER PRIMARY KEY,
    start_time INTEGER, -- null until dates are set
    end_time INTEGER,
    is_paused INTEGER NOT NULL,
    cursor_block INTEGER,
    cursor_log INTEGER,
    state TEXT NOT NULL
)
"#;

pub const CREATE_CANDIDATES_TABLE_SQL: &str = r#"
CREATE TABLE candidates (
    election_id INTEGER NOT NULL,
    candidate_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    party TEXT NOT NULL,
    metadata_uri TEXT NOT NULL,
    vote_count INTEGER NOT NULL,
    is_deleted INTEGER NOT NULL,
    PRIMARY KEY (election_id, candidate_id)
)
"#;

pub const CREATE_VOTE_RECORDS_TABLE_SQL: &str = r#"
CREATE TABLE vote_records (
    election_id INTEGER NOT NULL,
    voter TEXT NOT NULL,
    candidate_id INTEGER NOT NULL,
    block_number INTEGER NOT NULL,
    log_index INTEGER NOT NULL,
    tx_hash TEXT NOT NULL,
    PRIMARY KEY (election_id, voter)
)
"#;

pub const CREATE_DELEGATIONS_TABLE_SQL: &str = r#"
CREATE TABLE delegations (
    election_id INTEGER NOT NULL,
    from_address TEXT NOT NULL,
    to_address TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    log_index INTEGER NOT NULL,
    PRIMARY KEY (election_id, block_number, log_index)
)
"#;

pub const CREATE_CONTRACT_OWNER_TABLE_SQL: &str = r#"
CREATE TABLE contract_owner (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    owner TEXT,
    pending_owner TEXT
)
"#;

pub const CREATE_PROJECTION_WARNINGS_TABLE_SQL: &str = r#"
CREATE TABLE projection_warnings (
    block_number INTEGER NOT NULL,
    log_index INTEGER NOT NULL,
    tx_hash TEXT NOT NULL,
    kind TEXT NOT NULL,
    reason TEXT NOT NULL,
    recorded_at TEXT NOT NULL
)
"#;

/// v2: events remember the ingest batch that first stored them.
pub const ADD_LEDGER_EVENTS_BATCH_SQL: &str =
    "ALTER TABLE ledger_events ADD COLUMN batch_seq INTEGER NOT NULL DEFAULT 0";

pub const CREATE_DB_INDEXES_V2: &[&str] = &[
    "CREATE INDEX idx_ledger_events_batch ON ledger_events(batch_seq, block_number, log_index)",
];

pub const CREATE_DB_INDEXES: &[&str] = &[
    "CREATE INDEX idx_ledger_events_outcome ON ledger_events(outcome, block_number, log_index)",
    "CREATE INDEX idx_candidates_votes ON candidates(election_id, is_deleted, vote_count)",
    "CREATE INDEX idx_warnings_offset ON projection_warnings(block_number, log_index)",
];
