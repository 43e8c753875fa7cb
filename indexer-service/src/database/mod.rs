pub mod constants;
pub mod migrator;
pub mod models;
pub mod operations;
pub mod path;
pub mod sql;

use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

pub use migrator::run_migrations;
pub use path::DbLocation;

/// Connection pool for the projection store
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Validate the path, open the pool and run migrations
    pub async fn connect(db_path: &str) -> Result<Self> {
        let location = DbLocation::parse(db_path)?;
        info!("Initializing database at {:?}", location);

        let pool = match location {
            // Every connection to :memory: is a separate database; keep exactly one alive.
            DbLocation::Memory => {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
                    .await?
            }
            DbLocation::File(path) => {
                SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(
                        SqliteConnectOptions::new()
                            .filename(path)
                            .create_if_missing(true)
                            .foreign_keys(true),
                    )
                    .await?
            }
        };

        run_migrations(&pool).await?;

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
