//! Database migration implementation (SQLx)

use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use tracing::info;

use super::constants::{CURRENT_SCHEMA_VERSION, MIGRATION_DESCRIPTIONS};
use super::sql::{
    ADD_LEDGER_EVENTS_BATCH_SQL, CREATE_CANDIDATES_TABLE_SQL, CREATE_CONTRACT_OWNER_TABLE_SQL,
    CREATE_DB_INDEXES, CREATE_DB_INDEXES_V2, CREATE_DELEGATIONS_TABLE_SQL, CREATE_ELECTIONS_TABLE_SQL, CREATE_LEDGER_EVENTS_TABLE_SQL,
    CREATE_MIGRATIONS_TABLE_SQL, CREATE_PROJECTION_WARNINGS_TABLE_SQL,
    CREATE_VOTE_RECORDS_TABLE_SQL,
};

/// Run all pending database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations");

    sqlx::query(CREATE_MIGRATIONS_TABLE_SQL)
        .execute(pool)
        .await?;

    let current_version = get_current_version(pool).await?;
    info!("Current database version: {}", current_version);

    if current_version > CURRENT_SCHEMA_VERSION {
        anyhow::bail!(
            "Database schema version {} is newer than supported version {}",
            current_version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if current_version < 1 {
        apply_migration_v1(pool).await?;
    }
    if current_version < 2 {
        apply_migration_v2(pool).await?;
    }

    info!("All migrations completed");
    Ok(())
}

/// Get the current schema version
pub async fn get_current_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply migration version 1: event log, entity tables and indexes.
async fn apply_migration_v1(pool: &SqlitePool) -> Result<()> {
    info!("Applying migration v1: {}", MIGRATION_DESCRIPTIONS[0]);

    let mut tx = pool.begin().await?;

    for table_sql in [
        CREATE_LEDGER_EVENTS_TABLE_SQL,
        CREATE_ELECTIONS_TABLE_SQL,
        CREATE_CANDIDATES_TABLE_SQL,
        CREATE_VOTE_RECORDS_TABLE_SQL,
        CREATE_DELEGATIONS_TABLE_SQL,
        CREATE_CONTRACT_OWNER_TABLE_SQL,
        CREATE_PROJECTION_WARNINGS_TABLE_SQL,
    ] {
        sqlx::query(table_sql).execute(&mut *tx).await?;
    }

    for index_sql in CREATE_DB_INDEXES {
        sqlx::query(index_sql).execute(&mut *tx).await?;
    }

    sqlx::query(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
    )
    .bind(1)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(MIGRATION_DESCRIPTIONS[0])
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Migration v1 completed successfully");
    Ok(())
}

/// Apply migration version 2: batch sequence on `ledger_events`. Rows stored
/// before it share batch 0.
async fn apply_migration_v2(pool: &SqlitePool) -> Result<()> {
    info!("Applying migration v2: {}", MIGRATION_DESCRIPTIONS[1]);

    let mut tx = pool.begin().await?;

    sqlx::query(ADD_LEDGER_EVENTS_BATCH_SQL)
        .execute(&mut *tx)
        .await?;
    for index_sql in CREATE_DB_INDEXES_V2 {
        sqlx::query(index_sql).execute(&mut *tx).await?;
    }

    sqlx::query(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
    )
    .bind(2)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(MIGRATION_DESCRIPTIONS[1])
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Migration v2 completed successfully");
    Ok(())
}
