//! Versioned schema migrations for the observation store.
//!
//! Versioning uses `PRAGMA user_version`; each migration runs once and
//! bumps the version inside the same batch caller.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Migration v1: observations, promotion audit trail, pipeline metadata.
const V1_SQL: &str = "
CREATE TABLE IF NOT EXISTS observations (
    id TEXT PRIMARY KEY,
    source_session_id TEXT NOT NULL,
    source_adapter TEXT NOT NULL,
    content TEXT NOT NULL,
    category TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'pending',
    target_memories TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    promoted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_observations_state ON observations(state);
CREATE INDEX IF NOT EXISTS idx_observations_session ON observations(source_session_id);

CREATE TABLE IF NOT EXISTS promotion_records (
    observation_id TEXT NOT NULL,
    target_adapter TEXT NOT NULL,
    applied_at TEXT NOT NULL,
    content_written TEXT NOT NULL,
    PRIMARY KEY (observation_id, target_adapter)
);

CREATE TABLE IF NOT EXISTS pipeline_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Run all pending migrations.
pub(super) fn run_migrations(conn: &Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < 1 {
        conn.execute_batch(V1_SQL).map_err(Error::StoreWriteFailure)?;
        conn.pragma_update(None, "user_version", 1)
            .map_err(Error::StoreWriteFailure)?;
    }

    Ok(())
}
