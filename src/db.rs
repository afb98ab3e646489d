//! SQLite database connection management.
//!
//! Provides a connection pool to the SQLite database with WAL mode
//! enabled. The database file and its parent directories are created
//! automatically if they don't exist.
//!
//! # Connection Pool
//!
//! Uses `sqlx::SqlitePool` with up to 5 concurrent connections. Each
//! statement checks a connection out of the pool and returns it when the
//! statement's future completes or is dropped, so a timed-out or failed
//! request never holds on to a connection.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Create a connection pool to the configured SQLite database.
///
/// - Creates the database file and parent directories if they don't exist.
/// - Enables WAL journal mode and foreign keys.
/// - Bounds connection acquisition by `store.timeout_secs`.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(config.store.timeout_secs))
        .connect_with(options)
        .await?;

    Ok(pool)
}
