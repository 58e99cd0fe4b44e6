//! Persistence gateway over SQLite.
//!
//! Typed reads and writes per record kind, plus transaction-scoped variants
//! (`*_tx`) for the multi-write units of work in the tracker and importer.
//! Rows come back as tuples and are mapped by hand; queries use positional
//! binds only.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::Result;

mod activity;
mod executions;
mod migration;
mod milestones;
mod projects;
mod sessions;
mod tasks;

pub use migration::run_migrations;
pub use sessions::{SessionOverview, SessionPatch};
pub use tasks::TaskPatch;

/// Open a pool with foreign keys enforced, creating the database file if
/// needed.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
