//! Persisted observation store with a governed state machine.
//!
//! The store exclusively owns observation mutation. All mutating
//! operations go through one internal lock (single-writer discipline);
//! transitions are validated against the allowed-transition table under
//! that lock, against the currently persisted row.

mod migrations;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{
    Observation, ObservationDraft, ObservationState, PromotionRecord, SessionRecord,
};

/// Outcome of ingesting one draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Previously-unseen id; persisted as `pending`
    Inserted(String),
    /// Dedup hit; the existing observation was left untouched
    Duplicate(String),
}

/// Observation counts by state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub promoted: i64,
    pub archived: i64,
}

impl StoreStats {
    pub fn total(&self) -> i64 {
        self.pending + self.approved + self.rejected + self.promoted + self.archived
    }
}

/// SQLite-backed observation store.
///
/// Thread-safe via internal Mutex. At-most-one observation per id is
/// enforced by the primary key, across the lifetime of the store.
pub struct ObservationStore {
    conn: Mutex<Connection>,
}

impl ObservationStore {
    /// Open (and migrate) the store at `path`, creating parents.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────

    /// Ingest one draft extracted from `session`.
    ///
    /// The id is derived from the content hash, the session id and the
    /// capture day, so re-analyzing the same material is a silent dedup
    /// hit: the existing observation is left untouched.
    pub fn ingest(&self, draft: &ObservationDraft, session: &SessionRecord) -> Result<IngestOutcome> {
        let content = draft.content.trim().to_string();
        let content_hash = Observation::hash_content(&content);
        let id = Observation::derive_id(
            &content_hash,
            &session.session_id,
            session.captured_at.date_naive(),
        );

        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT INTO observations
                     (id, source_session_id, source_adapter, content, category,
                      content_hash, state, target_memories, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', '[]', ?7)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    id,
                    session.session_id,
                    session.source_adapter,
                    content,
                    draft.category,
                    content_hash,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(Error::StoreWriteFailure)?;

        if inserted == 0 {
            debug!(id, "dedup hit, observation already known");
            Ok(IngestOutcome::Duplicate(id))
        } else {
            Ok(IngestOutcome::Inserted(id))
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Get observation by id.
    pub fn get(&self, id: &str) -> Result<Option<Observation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{SELECT_OBSERVATION} WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], map_observation).optional()?)
    }

    /// List observations in a given state, oldest first.
    pub fn list_by_state(&self, state: ObservationState) -> Result<Vec<Observation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_OBSERVATION} WHERE state = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![state.as_str()], map_observation)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Observation counts by state.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM observations GROUP BY state")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = StoreStats::default();
        for row in rows {
            let (state, count) = row?;
            match ObservationState::parse(&state)? {
                ObservationState::Pending => stats.pending = count,
                ObservationState::Approved => stats.approved = count,
                ObservationState::Rejected => stats.rejected = count,
                ObservationState::Promoted => stats.promoted = count,
                ObservationState::Archived => stats.archived = count,
            }
        }
        Ok(stats)
    }

    // ─────────────────────────────────────────────────────────────────────
    // State transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Apply one state transition, validated against the allowed table.
    ///
    /// Returns the previous state. `promoted_at` is maintained so it is
    /// set if and only if the observation is `promoted`.
    pub fn set_state(&self, id: &str, to: ObservationState) -> Result<ObservationState> {
        self.transition(id, to, None)
    }

    /// Transition `approved -> promoted`, recording the memory targets
    /// written during promotion.
    pub fn mark_promoted(&self, id: &str, targets: &[String]) -> Result<()> {
        self.transition(id, ObservationState::Promoted, Some(targets))?;
        Ok(())
    }

    fn transition(
        &self,
        id: &str,
        to: ObservationState,
        targets: Option<&[String]>,
    ) -> Result<ObservationState> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(Error::StoreWriteFailure)?;

        let current: Option<String> = tx
            .query_row(
                "SELECT state FROM observations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let from = match current {
            Some(state) => ObservationState::parse(&state)?,
            None => return Err(Error::ObservationNotFound(id.to_string())),
        };

        if !from.can_transition(to) {
            return Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if to == ObservationState::Promoted {
            let targets_json = serde_json::to_string(targets.unwrap_or(&[]))
                .map_err(|e| Error::Serialization(e.to_string()))?;
            tx.execute(
                "UPDATE observations
                 SET state = ?2, promoted_at = ?3, target_memories = ?4
                 WHERE id = ?1",
                params![id, to.as_str(), Utc::now().to_rfc3339(), targets_json],
            )
        } else {
            tx.execute(
                "UPDATE observations SET state = ?2 WHERE id = ?1",
                params![id, to.as_str()],
            )
        }
        .map_err(Error::StoreWriteFailure)?;

        tx.commit().map_err(Error::StoreWriteFailure)?;
        debug!(id, %from, %to, "observation state advanced");
        Ok(from)
    }

    /// Archive rejected and promoted observations created before
    /// `cutoff`. Returns the number archived.
    pub fn archive_finished(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let ids: Vec<String> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT id FROM observations
                 WHERE state IN ('rejected', 'promoted') AND created_at < ?1",
            )?;
            let rows = stmt.query_map(params![cutoff.to_rfc3339()], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        for id in &ids {
            self.set_state(id, ObservationState::Archived)?;
        }
        Ok(ids.len())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Promotion audit trail
    // ─────────────────────────────────────────────────────────────────────

    /// Record one applied (observation, target) append. Re-recording the
    /// same pair refreshes the row; the trail stays one row per pair.
    pub fn record_promotion(&self, record: &PromotionRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO promotion_records
                 (observation_id, target_adapter, applied_at, content_written)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(observation_id, target_adapter)
             DO UPDATE SET applied_at = ?3, content_written = ?4",
            params![
                record.observation_id,
                record.target_adapter,
                record.applied_at.to_rfc3339(),
                record.content_written,
            ],
        )
        .map_err(Error::StoreWriteFailure)?;
        Ok(())
    }

    /// Whether a promotion was already applied for this pair.
    pub fn promotion_applied(&self, observation_id: &str, target: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM promotion_records
             WHERE observation_id = ?1 AND target_adapter = ?2",
            params![observation_id, target],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All promotion records for one observation.
    pub fn promotions_for(&self, observation_id: &str) -> Result<Vec<PromotionRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT observation_id, target_adapter, applied_at, content_written
             FROM promotion_records WHERE observation_id = ?1
             ORDER BY target_adapter",
        )?;
        let rows = stmt.query_map(params![observation_id], |row| {
            Ok(PromotionRecord {
                observation_id: row.get(0)?,
                target_adapter: row.get(1)?,
                applied_at: parse_ts(row, 2)?,
                content_written: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Analysis watermarks
    // ─────────────────────────────────────────────────────────────────────

    /// When `adapter` was last analyzed, if ever.
    pub fn last_analyzed_at(&self, adapter: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM pipeline_meta WHERE key = ?1",
                params![watermark_key(adapter)],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(raw) => {
                let ts = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(Some(ts.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    /// Advance the analysis watermark for `adapter`.
    pub fn set_last_analyzed_at(&self, adapter: &str, ts: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO pipeline_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![watermark_key(adapter), ts.to_rfc3339()],
        )
        .map_err(Error::StoreWriteFailure)?;
        Ok(())
    }
}

const SELECT_OBSERVATION: &str = "SELECT id, source_session_id, source_adapter, content, \
     category, content_hash, state, target_memories, created_at, promoted_at FROM observations";

fn watermark_key(adapter: &str) -> String {
    format!("last_analyzed_at/{adapter}")
}

fn map_observation(row: &Row) -> rusqlite::Result<Observation> {
    let state_raw: String = row.get(6)?;
    let state = ObservationState::parse(&state_raw)
        .map_err(|e| conversion_err(6, e))?;
    let targets_raw: String = row.get(7)?;
    let target_memories: Vec<String> = serde_json::from_str(&targets_raw)
        .map_err(|e| conversion_err(7, Error::Serialization(e.to_string())))?;
    let promoted_at: Option<String> = row.get(9)?;
    let promoted_at = match promoted_at {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| conversion_err(9, Error::Serialization(e.to_string())))?,
        ),
        None => None,
    };

    Ok(Observation {
        id: row.get(0)?,
        source_session_id: row.get(1)?,
        source_adapter: row.get(2)?,
        content: row.get(3)?,
        category: row.get(4)?,
        content_hash: row.get(5)?,
        state,
        target_memories,
        created_at: parse_ts(row, 8)?,
        promoted_at,
    })
}

fn parse_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, Error::Serialization(e.to_string())))
}

fn conversion_err(idx: usize, err: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObservationState::*;
    use chrono::Duration;

    fn session() -> SessionRecord {
        SessionRecord {
            source_adapter: "claude-code".to_string(),
            session_id: "proj/sess-1".to_string(),
            captured_at: Utc::now(),
            raw_content: "transcript".to_string(),
        }
    }

    fn draft(content: &str) -> ObservationDraft {
        ObservationDraft {
            content: content.to_string(),
            category: "pattern".to_string(),
            session_id: None,
        }
    }

    fn ingest_one(store: &ObservationStore, content: &str) -> String {
        match store.ingest(&draft(content), &session()).unwrap() {
            IngestOutcome::Inserted(id) => id,
            IngestOutcome::Duplicate(id) => id,
        }
    }

    #[test]
    fn test_ingest_then_get() {
        let store = ObservationStore::open_in_memory().unwrap();
        let id = ingest_one(&store, "used pattern X for retries");

        let obs = store.get(&id).unwrap().unwrap();
        assert_eq!(obs.state, Pending);
        assert_eq!(obs.content, "used pattern X for retries");
        assert_eq!(obs.category, "pattern");
        assert!(obs.promoted_at.is_none());
        assert!(obs.target_memories.is_empty());
    }

    #[test]
    fn test_dedup_same_content_same_session_same_day() {
        let store = ObservationStore::open_in_memory().unwrap();
        let sess = session();
        let d = draft("only once");

        let first = store.ingest(&d, &sess).unwrap();
        let second = store.ingest(&d, &sess).unwrap();

        assert!(matches!(first, IngestOutcome::Inserted(_)));
        match (first, second) {
            (IngestOutcome::Inserted(a), IngestOutcome::Duplicate(b)) => assert_eq!(a, b),
            other => panic!("expected insert then duplicate, got {other:?}"),
        }
        assert_eq!(store.stats().unwrap().total(), 1);
    }

    #[test]
    fn test_dedup_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.db");
        let sess = session();
        let d = draft("persisted");

        {
            let store = ObservationStore::open(&path).unwrap();
            assert!(matches!(
                store.ingest(&d, &sess).unwrap(),
                IngestOutcome::Inserted(_)
            ));
        }

        let store = ObservationStore::open(&path).unwrap();
        assert!(matches!(
            store.ingest(&d, &sess).unwrap(),
            IngestOutcome::Duplicate(_)
        ));
        assert_eq!(store.stats().unwrap().total(), 1);
    }

    #[test]
    fn test_dedup_does_not_touch_existing_state() {
        let store = ObservationStore::open_in_memory().unwrap();
        let sess = session();
        let d = draft("keep my state");

        let id = ingest_one(&store, "keep my state");
        store.set_state(&id, Approved).unwrap();

        store.ingest(&d, &sess).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().state, Approved);
    }

    #[test]
    fn test_valid_transitions_succeed() {
        let store = ObservationStore::open_in_memory().unwrap();

        let approved = ingest_one(&store, "to approve");
        assert_eq!(store.set_state(&approved, Approved).unwrap(), Pending);

        let rejected = ingest_one(&store, "to reject");
        store.set_state(&rejected, Rejected).unwrap();
        store.set_state(&rejected, Archived).unwrap();
        assert_eq!(store.get(&rejected).unwrap().unwrap().state, Archived);
    }

    #[test]
    fn test_invalid_transitions_fail_exhaustively() {
        let store = ObservationStore::open_in_memory().unwrap();

        // Drive one observation into each state through valid paths.
        let mut in_state = Vec::new();
        for target in ObservationState::all() {
            let id = ingest_one(&store, &format!("fixture for {target}"));
            match target {
                Pending => {}
                Approved => {
                    store.set_state(&id, Approved).unwrap();
                }
                Rejected => {
                    store.set_state(&id, Rejected).unwrap();
                }
                Promoted => {
                    store.set_state(&id, Approved).unwrap();
                    store.mark_promoted(&id, &[]).unwrap();
                }
                Archived => {
                    store.set_state(&id, Rejected).unwrap();
                    store.set_state(&id, Archived).unwrap();
                }
            }
            in_state.push((target, id));
        }

        for (from, id) in &in_state {
            for to in ObservationState::all() {
                if from.can_transition(to) {
                    continue;
                }
                let err = store.set_state(id, to).unwrap_err();
                assert!(
                    matches!(err, Error::InvalidStateTransition { .. }),
                    "expected InvalidStateTransition for {from} -> {to}, got {err:?}"
                );
                // Row must be untouched.
                assert_eq!(store.get(id).unwrap().unwrap().state, *from);
            }
        }
    }

    #[test]
    fn test_mark_promoted_sets_promoted_at_and_targets() {
        let store = ObservationStore::open_in_memory().unwrap();
        let id = ingest_one(&store, "promote me");
        store.set_state(&id, Approved).unwrap();
        store
            .mark_promoted(&id, &["claude-md".to_string(), "agents-md".to_string()])
            .unwrap();

        let obs = store.get(&id).unwrap().unwrap();
        assert_eq!(obs.state, Promoted);
        assert!(obs.promoted_at.is_some());
        assert_eq!(obs.target_memories, vec!["claude-md", "agents-md"]);
    }

    #[test]
    fn test_transition_on_missing_observation() {
        let store = ObservationStore::open_in_memory().unwrap();
        let err = store.set_state("nope", Approved).unwrap_err();
        assert!(matches!(err, Error::ObservationNotFound(_)));
    }

    #[test]
    fn test_promotion_records_round_trip() {
        let store = ObservationStore::open_in_memory().unwrap();
        let id = ingest_one(&store, "audited");

        assert!(!store.promotion_applied(&id, "claude-md").unwrap());
        store
            .record_promotion(&PromotionRecord {
                observation_id: id.clone(),
                target_adapter: "claude-md".to_string(),
                applied_at: Utc::now(),
                content_written: "## 2024-05-01\n\n- audited\n".to_string(),
            })
            .unwrap();

        assert!(store.promotion_applied(&id, "claude-md").unwrap());
        assert!(!store.promotion_applied(&id, "agents-md").unwrap());

        let records = store.promotions_for(&id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_adapter, "claude-md");
    }

    #[test]
    fn test_record_promotion_refreshes_pair() {
        let store = ObservationStore::open_in_memory().unwrap();
        let id = ingest_one(&store, "refreshed");
        let record = PromotionRecord {
            observation_id: id.clone(),
            target_adapter: "claude-md".to_string(),
            applied_at: Utc::now(),
            content_written: "fragment".to_string(),
        };
        store.record_promotion(&record).unwrap();
        store.record_promotion(&record).unwrap();
        assert_eq!(store.promotions_for(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_watermark_round_trip() {
        let store = ObservationStore::open_in_memory().unwrap();
        assert!(store.last_analyzed_at("claude-code").unwrap().is_none());

        let ts = Utc::now();
        store.set_last_analyzed_at("claude-code", ts).unwrap();
        let read = store.last_analyzed_at("claude-code").unwrap().unwrap();
        assert_eq!(read.timestamp(), ts.timestamp());
        assert!(store.last_analyzed_at("opencode").unwrap().is_none());
    }

    #[test]
    fn test_archive_finished_sweeps_only_terminal_states() {
        let store = ObservationStore::open_in_memory().unwrap();

        let rejected = ingest_one(&store, "was rejected");
        store.set_state(&rejected, Rejected).unwrap();

        let promoted = ingest_one(&store, "was promoted");
        store.set_state(&promoted, Approved).unwrap();
        store.mark_promoted(&promoted, &[]).unwrap();

        let pending = ingest_one(&store, "still pending");

        let cutoff = Utc::now() + Duration::hours(1);
        let archived = store.archive_finished(cutoff).unwrap();

        assert_eq!(archived, 2);
        assert_eq!(store.get(&rejected).unwrap().unwrap().state, Archived);
        assert_eq!(store.get(&promoted).unwrap().unwrap().state, Archived);
        assert_eq!(store.get(&pending).unwrap().unwrap().state, Pending);
    }
}
