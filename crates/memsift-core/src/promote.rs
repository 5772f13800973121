//! Promotion engine: durably writes approved observations into memory
//! destinations.
//!
//! Promotion is idempotent and safe to re-invoke. Each (observation,
//! target) append is guarded by the target's serialization lock and
//! journaled in the promotion audit trail before the observation's state
//! advances, so a crash between append and state-advance is recovered on
//! the next run: already-applied targets are skipped, the rest written.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::memory::MemoryAdapter;
use crate::store::ObservationStore;
use crate::types::{Observation, ObservationState, PromotionFailure, PromotionRecord};

/// Result of promoting one observation.
#[derive(Debug, Clone, Default)]
pub struct ObservationPromotion {
    pub observation_id: String,
    /// Targets appended during this invocation
    pub applied: Vec<String>,
    /// Targets skipped because already applied
    pub skipped: Vec<String>,
    /// Per-target failures; when non-empty the observation stays approved
    pub failed: Vec<PromotionFailure>,
    /// Whether the observation is `promoted` after this invocation
    pub promoted: bool,
}

/// Writes approved observations through the enabled memory adapters.
pub struct PromotionEngine {
    store: Arc<ObservationStore>,
    targets: Vec<Arc<dyn MemoryAdapter>>,
    /// One lock per destination; held for the full append+record sequence
    /// so two observations bound for the same file are never interleaved.
    locks: HashMap<String, Mutex<()>>,
}

impl PromotionEngine {
    pub fn new(store: Arc<ObservationStore>, targets: Vec<Arc<dyn MemoryAdapter>>) -> Self {
        let locks = targets
            .iter()
            .map(|t| (t.name().to_string(), Mutex::new(())))
            .collect();
        Self {
            store,
            targets,
            locks,
        }
    }

    /// Enabled memory adapters, in configured order.
    pub fn targets(&self) -> &[Arc<dyn MemoryAdapter>] {
        &self.targets
    }

    /// Promote one approved observation, best-effort per target.
    ///
    /// Re-invocation on an already-promoted observation is a no-op that
    /// re-verifies (and repairs) the destinations. Any other source state
    /// is an integrity error. Per-target write failures are collected;
    /// store failures abort immediately.
    pub fn promote(&self, observation: &Observation) -> Result<ObservationPromotion> {
        match observation.state {
            ObservationState::Approved | ObservationState::Promoted => {}
            other => {
                return Err(Error::InvalidStateTransition {
                    from: other.to_string(),
                    to: ObservationState::Promoted.to_string(),
                });
            }
        }

        let fragment = format_fragment(observation);
        let mut outcome = ObservationPromotion {
            observation_id: observation.id.clone(),
            ..Default::default()
        };

        for adapter in &self.targets {
            let name = adapter.name();
            let _guard = self
                .locks
                .get(name)
                .expect("engine holds a lock per target")
                .lock()
                .map_err(|_| Error::LockPoisoned)?;

            if self.store.promotion_applied(&observation.id, name)? {
                match adapter.read() {
                    Ok(existing) if existing.contains(&fragment) => {
                        debug!(observation = %observation.id, target = name, "already applied");
                        outcome.skipped.push(name.to_string());
                        continue;
                    }
                    Ok(_) => {
                        // Destination was rewritten underneath us; the
                        // audit row alone is not trusted.
                        warn!(
                            observation = %observation.id,
                            target = name,
                            "promotion record present but fragment missing, re-appending"
                        );
                    }
                    Err(e) => {
                        outcome.failed.push(PromotionFailure {
                            observation_id: observation.id.clone(),
                            target_adapter: name.to_string(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                }
            }

            match adapter.append(&fragment) {
                Ok(()) => {
                    self.store.record_promotion(&PromotionRecord {
                        observation_id: observation.id.clone(),
                        target_adapter: name.to_string(),
                        applied_at: Utc::now(),
                        content_written: fragment.clone(),
                    })?;
                    outcome.applied.push(name.to_string());
                }
                Err(Error::MemoryWriteFailure { reason, .. }) => {
                    outcome.failed.push(PromotionFailure {
                        observation_id: observation.id.clone(),
                        target_adapter: name.to_string(),
                        reason,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        if outcome.failed.is_empty() {
            if observation.state == ObservationState::Approved {
                let mut written: Vec<String> = outcome.applied.clone();
                written.extend(outcome.skipped.iter().cloned());
                self.store.mark_promoted(&observation.id, &written)?;
            }
            outcome.promoted = true;
        }

        Ok(outcome)
    }
}

/// Format an observation into its memory fragment.
///
/// Deterministic: the same observation always formats identically. The
/// header date is the observation's ingestion day (UTC); continuation
/// lines of multi-line content are indented under the bullet.
pub fn format_fragment(observation: &Observation) -> String {
    let date = observation.created_at.date_naive().format("%Y-%m-%d");
    let mut body = String::new();
    for (i, line) in observation.content.lines().enumerate() {
        if i == 0 {
            body.push_str("- ");
            body.push_str(line.trim_end());
        } else if line.trim().is_empty() {
            body.push('\n');
        } else {
            body.push_str("\n  ");
            body.push_str(line.trim_end());
        }
    }
    format!("## {date}\n\n{body}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ClaudeMdMemory;
    use crate::store::IngestOutcome;
    use crate::types::{ObservationDraft, SessionRecord};
    use chrono::{DateTime, Utc};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    fn fixed_observation(content: &str) -> Observation {
        Observation {
            id: "obs-1".to_string(),
            source_session_id: "proj/sess-1".to_string(),
            source_adapter: "claude-code".to_string(),
            content: content.to_string(),
            category: "pattern".to_string(),
            content_hash: Observation::hash_content(content),
            state: ObservationState::Approved,
            target_memories: vec![],
            created_at: "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap(),
            promoted_at: None,
        }
    }

    fn approved_in_store(store: &ObservationStore, content: &str) -> Observation {
        let session = SessionRecord {
            source_adapter: "claude-code".to_string(),
            session_id: "proj/sess-1".to_string(),
            captured_at: Utc::now(),
            raw_content: String::new(),
        };
        let draft = ObservationDraft {
            content: content.to_string(),
            category: "pattern".to_string(),
            session_id: None,
        };
        let id = match store.ingest(&draft, &session).unwrap() {
            IngestOutcome::Inserted(id) => id,
            IngestOutcome::Duplicate(id) => id,
        };
        store.set_state(&id, ObservationState::Approved).unwrap();
        store.get(&id).unwrap().unwrap()
    }

    /// Memory adapter whose appends can be made to fail on demand.
    struct FlakyMemory {
        path: PathBuf,
        failing: AtomicBool,
    }

    impl FlakyMemory {
        fn new(path: PathBuf) -> Self {
            Self {
                path,
                failing: AtomicBool::new(false),
            }
        }
    }

    impl MemoryAdapter for FlakyMemory {
        fn name(&self) -> &'static str {
            "flaky-md"
        }

        fn path(&self) -> PathBuf {
            self.path.clone()
        }

        fn append(&self, fragment: &str) -> crate::error::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::memory_write_failure("flaky-md", "disk full"));
            }
            crate::memory::append_atomic("flaky-md", &self.path, fragment)
        }
    }

    #[test]
    fn test_format_fragment_matches_contract() {
        let obs = fixed_observation("used pattern X for retries");
        assert_eq!(
            format_fragment(&obs),
            "## 2024-05-01\n\n- used pattern X for retries\n"
        );
    }

    #[test]
    fn test_format_fragment_multiline_indents_continuations() {
        let obs = fixed_observation("first line\nsecond line");
        assert_eq!(
            format_fragment(&obs),
            "## 2024-05-01\n\n- first line\n  second line\n"
        );
    }

    #[test]
    fn test_format_fragment_is_deterministic() {
        let obs = fixed_observation("anything");
        assert_eq!(format_fragment(&obs), format_fragment(&obs));
    }

    #[test]
    fn test_promotion_end_to_end() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ObservationStore::open_in_memory().unwrap());
        let target = Arc::new(ClaudeMdMemory::at(dir.path().join("CLAUDE.md")));
        let engine = PromotionEngine::new(store.clone(), vec![target.clone()]);

        let obs = approved_in_store(&store, "used pattern X for retries");
        let result = engine.promote(&obs).unwrap();

        assert!(result.promoted);
        assert_eq!(result.applied, vec!["claude-md"]);

        let stored = store.get(&obs.id).unwrap().unwrap();
        assert_eq!(stored.state, ObservationState::Promoted);
        assert!(stored.promoted_at.is_some());
        assert_eq!(stored.target_memories, vec!["claude-md"]);

        let content = target.read().unwrap();
        assert!(content.contains("- used pattern X for retries"));
    }

    #[test]
    fn test_promotion_idempotence() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ObservationStore::open_in_memory().unwrap());
        let target = Arc::new(ClaudeMdMemory::at(dir.path().join("CLAUDE.md")));
        let engine = PromotionEngine::new(store.clone(), vec![target.clone()]);

        let obs = approved_in_store(&store, "promote once");
        let fragment = format_fragment(&obs);

        assert!(engine.promote(&obs).unwrap().promoted);
        // Second invocation on the refreshed row is a no-op.
        let refreshed = store.get(&obs.id).unwrap().unwrap();
        let second = engine.promote(&refreshed).unwrap();

        assert!(second.promoted);
        assert!(second.applied.is_empty());
        assert_eq!(second.skipped, vec!["claude-md"]);

        let content = target.read().unwrap();
        assert_eq!(content.matches(&fragment).count(), 1);
    }

    #[test]
    fn test_crash_recovery_skips_applied_targets() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ObservationStore::open_in_memory().unwrap());
        let a = Arc::new(ClaudeMdMemory::at(dir.path().join("a/CLAUDE.md")));
        let b = Arc::new(FlakyMemory::new(dir.path().join("b/AGENTS.md")));
        let engine = PromotionEngine::new(store.clone(), vec![a.clone(), b.clone()]);

        let obs = approved_in_store(&store, "recovered");
        let fragment = format_fragment(&obs);

        // Simulate a crash after target `a` was appended and journaled
        // but before the state advanced.
        a.append(&fragment).unwrap();
        store
            .record_promotion(&PromotionRecord {
                observation_id: obs.id.clone(),
                target_adapter: "claude-md".to_string(),
                applied_at: Utc::now(),
                content_written: fragment.clone(),
            })
            .unwrap();

        let result = engine.promote(&obs).unwrap();
        assert!(result.promoted);
        assert_eq!(result.skipped, vec!["claude-md"]);
        assert_eq!(result.applied, vec!["flaky-md"]);
        assert_eq!(a.read().unwrap().matches(&fragment).count(), 1);
    }

    #[test]
    fn test_stale_record_with_missing_fragment_reappends() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ObservationStore::open_in_memory().unwrap());
        let target = Arc::new(ClaudeMdMemory::at(dir.path().join("CLAUDE.md")));
        let engine = PromotionEngine::new(store.clone(), vec![target.clone()]);

        let obs = approved_in_store(&store, "resilient");
        let fragment = format_fragment(&obs);

        // Audit row exists but the destination was externally rewritten.
        store
            .record_promotion(&PromotionRecord {
                observation_id: obs.id.clone(),
                target_adapter: "claude-md".to_string(),
                applied_at: Utc::now(),
                content_written: fragment.clone(),
            })
            .unwrap();
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(target.path(), "# wiped\n").unwrap();

        let result = engine.promote(&obs).unwrap();
        assert!(result.promoted);
        assert_eq!(result.applied, vec!["claude-md"]);

        let content = target.read().unwrap();
        assert!(content.starts_with("# wiped\n"));
        assert_eq!(content.matches(&fragment).count(), 1);
    }

    #[test]
    fn test_partial_failure_keeps_observation_approved() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ObservationStore::open_in_memory().unwrap());
        let good = Arc::new(ClaudeMdMemory::at(dir.path().join("CLAUDE.md")));
        let flaky = Arc::new(FlakyMemory::new(dir.path().join("AGENTS.md")));
        flaky.failing.store(true, Ordering::SeqCst);
        let engine = PromotionEngine::new(store.clone(), vec![good.clone(), flaky.clone()]);

        let obs = approved_in_store(&store, "half landed");
        let result = engine.promote(&obs).unwrap();

        assert!(!result.promoted);
        assert_eq!(result.applied, vec!["claude-md"]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].target_adapter, "flaky-md");
        assert_eq!(
            store.get(&obs.id).unwrap().unwrap().state,
            ObservationState::Approved
        );

        // Retry after the target recovers: only the missing append runs.
        flaky.failing.store(false, Ordering::SeqCst);
        let retry = engine.promote(&obs).unwrap();
        assert!(retry.promoted);
        assert_eq!(retry.skipped, vec!["claude-md"]);
        assert_eq!(retry.applied, vec!["flaky-md"]);

        let fragment = format_fragment(&obs);
        assert_eq!(good.read().unwrap().matches(&fragment).count(), 1);
    }

    #[test]
    fn test_promote_rejects_unreviewed_observation() {
        let store = Arc::new(ObservationStore::open_in_memory().unwrap());
        let engine = PromotionEngine::new(store.clone(), vec![]);

        let mut obs = fixed_observation("not reviewed");
        obs.state = ObservationState::Pending;
        let err = engine.promote(&obs).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_concurrent_promotions_never_interleave() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ObservationStore::open_in_memory().unwrap());
        let target = Arc::new(ClaudeMdMemory::at(dir.path().join("CLAUDE.md")));
        let engine = Arc::new(PromotionEngine::new(store.clone(), vec![target.clone()]));

        let first = approved_in_store(&store, "first concurrent observation");
        let second = approved_in_store(&store, "second concurrent observation");

        std::thread::scope(|scope| {
            let engine_a = engine.clone();
            let engine_b = engine.clone();
            let a = scope.spawn(move || engine_a.promote(&first).unwrap());
            let b = scope.spawn(move || engine_b.promote(&second).unwrap());
            assert!(a.join().unwrap().promoted);
            assert!(b.join().unwrap().promoted);
        });

        let content = target.read().unwrap();
        assert_eq!(content.matches("- first concurrent observation").count(), 1);
        assert_eq!(content.matches("- second concurrent observation").count(), 1);
        // Fragments are whole: every header starts a well-formed block.
        assert_eq!(content.matches("## ").count(), 2);
    }
}
