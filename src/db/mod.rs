pub mod migrations;
pub mod queries;

use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

const IN_MEMORY: &str = ":memory:";

/// How long a statement waits on a lock held by another process before
/// failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the booking database at `path` (`:memory:` for a throwaway one) and
/// bring its schema up to date.
///
/// Foreign keys are switched on for every connection since SQLite leaves them
/// off by default, and the cascading deletes of services and bookings rely on
/// them. File databases also get WAL journaling.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = if path == IN_MEMORY {
        Connection::open_in_memory()
    } else {
        Connection::open(path)
    }
    .with_context(|| format!("failed to open database at {path}"))?;

    conn.pragma_update(None, "foreign_keys", true)
        .context("failed to enable foreign keys")?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    if path != IN_MEMORY {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("failed to switch to WAL journaling")?;
        tracing::debug!(journal_mode = %mode, "database journal mode");
    }

    migrations::run_migrations(&conn)?;
    tracing::info!(path, "database ready");
    Ok(conn)
}
