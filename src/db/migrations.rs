//! Opening the metadata cache and bringing its schema up to date.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Bumped whenever `schema.sql` changes.
pub const SCHEMA_VERSION: i64 = 1;

/// Open (creating if needed) the SQLite metadata cache at `db_path`.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    let applied = run_migrations(&pool).await?;
    info!(path = db_path, migrated = applied, "Metadata cache ready");
    Ok(pool)
}

/// Apply `schema.sql` when the stored version is behind. Returns whether it ran.
async fn run_migrations(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    let current: i64 = sqlx::query("PRAGMA user_version")
        .fetch_one(pool)
        .await?
        .get(0);
    if current >= SCHEMA_VERSION {
        debug!(version = current, "Schema up to date");
        return Ok(false);
    }

    let mut tx = pool.begin().await?;
    for statement in include_str!("schema.sql").split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
    }
    // PRAGMA does not accept bound parameters
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    debug!(from = current, to = SCHEMA_VERSION, "Schema migrated");
    Ok(true)
}
