//! SQLite pool setup and the write-contention retry shared by every store.
//!
//! SQLite allows a single writer at a time. A write that races another writer
//! fails with `SQLITE_BUSY` / `SQLITE_LOCKED`; [`retry_busy`] re-runs such
//! writes with a short exponential backoff before surfacing the error.

use std::{future::Future, path::Path, str::FromStr, time::Duration};

use {
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    },
    tracing::debug,
};

use crate::Result;

/// Attempts made by [`retry_busy`] before giving up (including the first).
pub const BUSY_MAX_ATTEMPTS: u32 = 5;

/// Delay before the first busy retry; doubled after each attempt.
pub const BUSY_BASE_DELAY: Duration = Duration::from_millis(10);

const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Connection options used for on-disk databases.
pub fn connect_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
}

/// Open (creating if needed) the database file at `path`.
pub async fn open_pool(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(path))
        .await?;
    debug!(path = %path.display(), "opened sqlite database");
    Ok(pool)
}

/// Single-connection in-memory database (each connection to `:memory:` is a
/// separate database, so the pool must never open a second one).
pub async fn memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Whether `err` is SQLite reporting write contention.
pub fn is_busy(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    let by_code = db
        .code()
        .and_then(|c| c.parse::<i64>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED));
    if by_code {
        return true;
    }
    let message = db.message().to_ascii_lowercase();
    message.contains("database is locked") || message.contains("database table is locked")
}

/// Run `op`, retrying while it fails with a busy/locked error.
///
/// `what` names the operation in logs. Non-busy errors are returned on the
/// first occurrence.
pub async fn retry_busy<T, F, Fut>(what: &str, mut op: F) -> std::result::Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut delay = BUSY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if is_busy(&e) && attempt < BUSY_MAX_ATTEMPTS => {
                debug!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "sqlite busy, retrying write"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            },
            other => return other,
        }
    }
}
