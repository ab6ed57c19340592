//! Backlog database open and scheduler-owned schema
//!
//! The backlog file is produced by the upstream correction pipeline and
//! must already exist; the scheduler never creates it. All scheduler-owned
//! tables are namespaced `lcsc_*` and reference the upstream tables by
//! foreign key with cascading delete, so removing an upstream target row
//! cleans up all scheduler state for it.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode, SqlitePoolOptions,
};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{Error, Result};

/// Busy timeout applied to every connection
const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Open the backlog file for exclusive scheduling use.
///
/// One connection per open backlog: task claim and result write must be
/// serialized relative to each other, and SQLite's own locking does that
/// across processes once the single in-process connection is exclusive.
/// The pragmas are connection options, not one-shot statements, so a
/// connection the pool re-establishes carries them too; lifetime and idle
/// recycling are disabled so the exclusive lock is never silently dropped
/// mid-run.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!("Could not find backlog file: {}", db_path.display())));
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .foreign_keys(true)
        .locking_mode(SqliteLockingMode::Exclusive)
        .journal_mode(SqliteJournalMode::Truncate)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .max_lifetime(None)
        .idle_timeout(None)
        .connect_with(options)
        .await?;

    debug!("Opened backlog: {}", db_path.display());
    Ok(pool)
}

/// Open the backlog in read-only mode for inspection tools.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!("Could not find backlog file: {}", db_path.display())));
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Check whether a table exists in the backlog
pub async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Create all scheduler-owned tables and indices (idempotent)
pub async fn create_scheduler_tables(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_diagnostics_table(pool).await?;
    create_results_table(pool).await?;

    // Index the upstream status column the selector filters on; the
    // correction stage should have created it, but older backlogs lack it.
    sqlx::query("CREATE INDEX IF NOT EXISTS todolist_corr_status_idx ON todolist (corr_status)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lcsc_settings (
            tset TEXT NOT NULL,
            version TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_diagnostics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lcsc_diagnostics (
            priority INTEGER NOT NULL,
            classifier TEXT NOT NULL,
            status INTEGER NOT NULL,
            elaptime REAL,
            worker_wait_time REAL,
            errors TEXT,
            PRIMARY KEY (priority, classifier),
            FOREIGN KEY (priority) REFERENCES todolist(priority) ON DELETE CASCADE ON UPDATE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS lcsc_diag_status_idx ON lcsc_diagnostics (status)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lcsc_results (
            priority INTEGER NOT NULL,
            classifier TEXT NOT NULL,
            class TEXT NOT NULL,
            prob REAL NOT NULL,
            FOREIGN KEY (priority, classifier) REFERENCES lcsc_diagnostics(priority, classifier) ON DELETE CASCADE ON UPDATE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS lcsc_results_priority_classifier_idx ON lcsc_results (priority, classifier)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop all scheduler-owned results state for a fresh run.
///
/// The feature cache tables survive on purpose: features do not depend on
/// the training set and recomputing them is the expensive part.
pub async fn drop_scheduler_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS lcsc_results").execute(pool).await?;
    sqlx::query("DROP TABLE IF EXISTS lcsc_diagnostics").execute(pool).await?;
    sqlx::query("DROP TABLE IF EXISTS lcsc_settings").execute(pool).await?;
    Ok(())
}
