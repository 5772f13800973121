//! Shared data types for the observation pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Raw capture from one external coding tool.
///
/// Immutable once captured. Produced only by a `SessionAdapter`;
/// discarded after analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Name of the adapter that captured this session
    pub source_adapter: String,
    /// Tool-specific session identifier
    pub session_id: String,
    /// When the session material was captured
    pub captured_at: DateTime<Utc>,
    /// Opaque transcript text
    pub raw_content: String,
}

/// A candidate observation returned by an LLM adapter, before ingestion.
///
/// Drafts carry no identity; the store derives it at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationDraft {
    /// Normalized, markdown-ready text
    pub content: String,
    /// Free-form tag (convention, pattern, gotcha, ...)
    #[serde(default = "default_category")]
    pub category: String,
    /// Session the draft was extracted from, echoed back by the backend.
    /// May be omitted when the analyzed batch held a single session.
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_category() -> String {
    "general".to_string()
}

/// Lifecycle state of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationState {
    /// Ingested, awaiting review
    Pending,
    /// Reviewer approved, awaiting promotion
    Approved,
    /// Reviewer rejected
    Rejected,
    /// Durably written to all memory targets
    Promoted,
    /// Housekeeping swept a finished observation
    Archived,
}

impl ObservationState {
    /// Whether a transition from `self` to `to` is allowed.
    ///
    /// The table is forward-only; everything not listed is an
    /// integrity error.
    pub fn can_transition(self, to: ObservationState) -> bool {
        use ObservationState::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Promoted)
                | (Rejected, Archived)
                | (Promoted, Archived)
        )
    }

    /// Convert to string for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationState::Pending => "pending",
            ObservationState::Approved => "approved",
            ObservationState::Rejected => "rejected",
            ObservationState::Promoted => "promoted",
            ObservationState::Archived => "archived",
        }
    }

    /// Parse from storage representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ObservationState::Pending),
            "approved" => Ok(ObservationState::Approved),
            "rejected" => Ok(ObservationState::Rejected),
            "promoted" => Ok(ObservationState::Promoted),
            "archived" => Ok(ObservationState::Archived),
            other => Err(Error::Serialization(format!(
                "unknown observation state: {other}"
            ))),
        }
    }

    /// All states, for exhaustive transition checks.
    pub fn all() -> [ObservationState; 5] {
        [
            ObservationState::Pending,
            ObservationState::Approved,
            ObservationState::Rejected,
            ObservationState::Promoted,
            ObservationState::Archived,
        ]
    }
}

impl std::fmt::Display for ObservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of potential long-term memory extracted from a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Stable id derived from content hash, session id and day bucket
    pub id: String,
    /// Session the observation was extracted from
    pub source_session_id: String,
    /// Session adapter that captured the source material
    pub source_adapter: String,
    /// Normalized, markdown-ready content
    pub content: String,
    /// Free-form category tag
    pub category: String,
    /// SHA-256 of the normalized content, hex-encoded
    pub content_hash: String,
    /// Lifecycle state
    pub state: ObservationState,
    /// Memory adapter names written at promotion time
    pub target_memories: Vec<String>,
    /// When the observation was ingested
    pub created_at: DateTime<Utc>,
    /// Set if and only if state == Promoted
    pub promoted_at: Option<DateTime<Utc>>,
}

impl Observation {
    /// Hash normalized content for dedup.
    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.trim().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Derive the stable observation id.
    ///
    /// Deterministic over (content hash, session id, capture day), so
    /// re-analyzing the same session material never mints a second id.
    pub fn derive_id(content_hash: &str, source_session_id: &str, day: NaiveDate) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content_hash.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(source_session_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(day.format("%Y-%m-%d").to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Which capability family an adapter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Session,
    Llm,
    Memory,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Session => write!(f, "session"),
            AdapterKind::Llm => write!(f, "llm"),
            AdapterKind::Memory => write!(f, "memory"),
        }
    }
}

/// Result of one adapter availability probe.
///
/// Ephemeral: recomputed per pipeline invocation, never persisted.
#[derive(Debug, Clone)]
pub struct AdapterAvailability {
    pub adapter_name: String,
    pub kind: AdapterKind,
    pub available: bool,
    pub checked_at: DateTime<Utc>,
    /// Human-readable reason when unavailable
    pub detail: Option<String>,
    /// Suggested fix for the user-facing surface
    pub remedy_hint: Option<String>,
}

impl AdapterAvailability {
    /// Probe succeeded.
    pub fn available(name: impl Into<String>, kind: AdapterKind) -> Self {
        Self {
            adapter_name: name.into(),
            kind,
            available: true,
            checked_at: Utc::now(),
            detail: None,
            remedy_hint: None,
        }
    }

    /// Probe failed.
    pub fn unavailable(
        name: impl Into<String>,
        kind: AdapterKind,
        detail: impl Into<String>,
        remedy_hint: impl Into<String>,
    ) -> Self {
        Self {
            adapter_name: name.into(),
            kind,
            available: false,
            checked_at: Utc::now(),
            detail: Some(detail.into()),
            remedy_hint: Some(remedy_hint.into()),
        }
    }
}

/// Append-only audit row for one (observation, target) promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub observation_id: String,
    pub target_adapter: String,
    pub applied_at: DateTime<Utc>,
    pub content_written: String,
}

/// Structured result of one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    /// New observations persisted as pending
    pub ingested: usize,
    /// Dedup hits (already-known ids, silently counted)
    pub deduped: usize,
    /// Sessions successfully read and analyzed
    pub sessions_analyzed: usize,
    /// Per-session read failures (batch continued)
    pub sessions_failed: usize,
    /// Session adapters skipped because their probe failed
    pub adapters_skipped: usize,
    /// No session adapter was available; run produced no new material
    pub degraded: bool,
    /// Per-adapter analysis failures (timeout, malformed response)
    pub failures: Vec<AnalysisFailure>,
}

/// One failed analysis call, attributed to a session adapter batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub adapter: String,
    pub reason: String,
}

/// Structured result of one promotion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromotionOutcome {
    /// Observations that reached `promoted`
    pub promoted: usize,
    /// Target appends skipped because already applied
    pub skipped_targets: usize,
    /// Per-target failures; the observation stays `approved`
    pub failed: Vec<PromotionFailure>,
}

/// One failed (observation, target) append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionFailure {
    pub observation_id: String,
    pub target_adapter: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transition_table() {
        use ObservationState::*;
        assert!(Pending.can_transition(Approved));
        assert!(Pending.can_transition(Rejected));
        assert!(Approved.can_transition(Promoted));
        assert!(Rejected.can_transition(Archived));
        assert!(Promoted.can_transition(Archived));
    }

    #[test]
    fn test_state_transitions_are_forward_only() {
        use ObservationState::*;
        let allowed = [
            (Pending, Approved),
            (Pending, Rejected),
            (Approved, Promoted),
            (Rejected, Archived),
            (Promoted, Archived),
        ];
        for from in ObservationState::all() {
            for to in ObservationState::all() {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    expected,
                    "transition {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_state_round_trip() {
        for state in ObservationState::all() {
            assert_eq!(ObservationState::parse(state.as_str()).unwrap(), state);
        }
        assert!(ObservationState::parse("bogus").is_err());
    }

    #[test]
    fn test_derive_id_deterministic() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let hash = Observation::hash_content("used pattern X for retries");
        let a = Observation::derive_id(&hash, "sess-1", day);
        let b = Observation::derive_id(&hash, "sess-1", day);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_id_varies_by_inputs() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let next_day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let hash = Observation::hash_content("content");
        let base = Observation::derive_id(&hash, "sess-1", day);
        assert_ne!(base, Observation::derive_id(&hash, "sess-2", day));
        assert_ne!(base, Observation::derive_id(&hash, "sess-1", next_day));
        let other = Observation::hash_content("different content");
        assert_ne!(base, Observation::derive_id(&other, "sess-1", day));
    }

    #[test]
    fn test_hash_content_normalizes_whitespace() {
        assert_eq!(
            Observation::hash_content("  trimmed  "),
            Observation::hash_content("trimmed")
        );
    }

    #[test]
    fn test_draft_category_defaults() {
        let draft: ObservationDraft = serde_json::from_str(r#"{"content": "x"}"#).unwrap();
        assert_eq!(draft.category, "general");
    }
}
