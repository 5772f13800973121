//! Pipeline entry points.
//!
//! The opaque operations invoked by external triggers (scheduler or
//! CLI): run an analysis batch, promote approved observations, archive
//! finished ones. Entry points return structured outcomes and never
//! format text output.
//!
//! Approval and promotion are separate, independently cancellable
//! steps - aborting a review session promotes nothing.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::availability::{validate_availability, AvailabilityReport};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::llm::LlmAdapter;
use crate::memory::MemoryAdapter;
use crate::promote::PromotionEngine;
use crate::registry;
use crate::session::SessionAdapter;
use crate::store::ObservationStore;
use crate::types::{
    AdapterKind, AnalysisFailure, AnalysisOutcome, ObservationDraft, ObservationState,
    PromotionOutcome, SessionRecord,
};

/// The observation lifecycle pipeline.
pub struct Pipeline {
    store: Arc<ObservationStore>,
    sessions: Vec<Arc<dyn SessionAdapter>>,
    llm: Arc<dyn LlmAdapter>,
    engine: PromotionEngine,
}

impl Pipeline {
    /// Assemble a pipeline from explicit parts.
    pub fn new(
        store: Arc<ObservationStore>,
        sessions: Vec<Arc<dyn SessionAdapter>>,
        llm: Arc<dyn LlmAdapter>,
        memories: Vec<Arc<dyn MemoryAdapter>>,
    ) -> Self {
        let engine = PromotionEngine::new(store.clone(), memories);
        Self {
            store,
            sessions,
            llm,
            engine,
        }
    }

    /// Assemble a pipeline from configuration: open the store under the
    /// data dir and resolve every named adapter through the registry.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let set = registry::resolve(config)?;
        let store = Arc::new(ObservationStore::open(&config.store_path())?);
        Ok(Self::new(store, set.sessions, set.llm, set.memories))
    }

    /// The underlying store, for the review surface.
    pub fn store(&self) -> &Arc<ObservationStore> {
        &self.store
    }

    /// Probe all adapters and apply the gating policy.
    pub fn availability(&self) -> AvailabilityReport {
        validate_availability(&self.sessions, self.llm.as_ref(), self.engine_targets())
    }

    fn engine_targets(&self) -> &[Arc<dyn MemoryAdapter>] {
        self.engine.targets()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Analysis
    // ─────────────────────────────────────────────────────────────────────

    /// Run one analysis batch across all enabled session adapters.
    ///
    /// Hard-fails before ingesting anything when the selected LLM
    /// adapter is unavailable. Per-session read failures and per-adapter
    /// analysis failures are collected; the batch continues. An
    /// adapter's watermark only advances after its pass fully succeeds,
    /// so failed material is retried on the next run.
    pub async fn run_analysis(&self) -> Result<AnalysisOutcome> {
        let report = self.availability();
        report.gate_analysis()?;

        let mut outcome = AnalysisOutcome {
            degraded: report.degraded,
            ..Default::default()
        };

        for adapter in &self.sessions {
            let name = adapter.name();
            if !report.available(AdapterKind::Session, name) {
                outcome.adapters_skipped += 1;
                continue;
            }

            let since = self
                .store
                .last_analyzed_at(name)?
                .unwrap_or(DateTime::UNIX_EPOCH);
            let pass_started = Utc::now();

            let ids = match adapter.list_sessions(since) {
                Ok(ids) => ids,
                Err(e) => {
                    outcome.failures.push(AnalysisFailure {
                        adapter: name.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let mut records = Vec::new();
            for id in &ids {
                match adapter.read_session(id) {
                    Ok(record) => records.push(record),
                    Err(Error::SessionUnreadable { session_id, reason }) => {
                        warn!(session_id, reason, "skipping unreadable session");
                        outcome.sessions_failed += 1;
                    }
                    Err(other) => return Err(other),
                }
            }

            if records.is_empty() {
                self.store.set_last_analyzed_at(name, pass_started)?;
                continue;
            }

            let drafts = match self.llm.analyze(&records).await {
                Ok(drafts) => drafts,
                Err(
                    e @ (Error::AnalysisTimeout { .. }
                    | Error::MalformedAnalysisResult(_)
                    | Error::AdapterUnavailable { .. }),
                ) => {
                    outcome.failures.push(AnalysisFailure {
                        adapter: name.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(other) => return Err(other),
            };

            let attributed = match attribute_drafts(&records, drafts) {
                Ok(pairs) => pairs,
                Err(e) => {
                    outcome.failures.push(AnalysisFailure {
                        adapter: name.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for (record, draft) in attributed {
                match self.store.ingest(&draft, record)? {
                    crate::store::IngestOutcome::Inserted(_) => outcome.ingested += 1,
                    crate::store::IngestOutcome::Duplicate(_) => outcome.deduped += 1,
                }
            }
            outcome.sessions_analyzed += records.len();
            self.store.set_last_analyzed_at(name, pass_started)?;
        }

        info!(
            ingested = outcome.ingested,
            deduped = outcome.deduped,
            failed = outcome.sessions_failed,
            "analysis batch finished"
        );
        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Review decisions
    // ─────────────────────────────────────────────────────────────────────

    /// Reviewer approves a pending observation.
    pub fn approve(&self, id: &str) -> Result<()> {
        self.store.set_state(id, ObservationState::Approved)?;
        Ok(())
    }

    /// Reviewer rejects a pending observation.
    pub fn reject(&self, id: &str) -> Result<()> {
        self.store.set_state(id, ObservationState::Rejected)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Promotion & housekeeping
    // ─────────────────────────────────────────────────────────────────────

    /// Promote every approved observation, best-effort per observation.
    pub fn run_promotion(&self) -> Result<PromotionOutcome> {
        let mut outcome = PromotionOutcome::default();

        for observation in self.store.list_by_state(ObservationState::Approved)? {
            let result = self.engine.promote(&observation)?;
            if result.promoted {
                outcome.promoted += 1;
            }
            outcome.skipped_targets += result.skipped.len();
            outcome.failed.extend(result.failed);
        }

        info!(
            promoted = outcome.promoted,
            failed = outcome.failed.len(),
            "promotion batch finished"
        );
        Ok(outcome)
    }

    /// Archive rejected and promoted observations older than `max_age`.
    pub fn run_housekeeping(&self, max_age: Duration) -> Result<usize> {
        self.store.archive_finished(Utc::now() - max_age)
    }
}

/// Pair each draft with the session record it came from.
///
/// A draft that cannot be attributed makes the whole batch malformed -
/// consistent with the no-partial-salvage rule for analysis results.
fn attribute_drafts(
    records: &[SessionRecord],
    drafts: Vec<ObservationDraft>,
) -> Result<Vec<(&SessionRecord, ObservationDraft)>> {
    let by_id: HashMap<&str, &SessionRecord> = records
        .iter()
        .map(|r| (r.session_id.as_str(), r))
        .collect();

    let mut attributed = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let record = match draft.session_id.as_deref() {
            Some(id) => *by_id.get(id).ok_or_else(|| {
                Error::MalformedAnalysisResult(format!("draft references unknown session {id}"))
            })?,
            None if records.len() == 1 => &records[0],
            None => {
                return Err(Error::MalformedAnalysisResult(
                    "draft missing session attribution".to_string(),
                ));
            }
        };
        attributed.push((record, draft));
    }
    Ok(attributed)
}
