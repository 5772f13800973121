//! memsift-core - Observation lifecycle and memory promotion pipeline
//!
//! This crate turns raw coding-session transcripts into reviewed,
//! long-lived memory for AI coding assistants:
//!
//! - **session**: adapters over each tool's session storage
//! - **llm**: adapters over analysis backends (transcripts -> drafts)
//! - **store**: persisted observation store with a governed state machine
//! - **promote**: idempotent promotion into memory destinations
//! - **memory**: adapters over destination memory files
//! - **availability**: go/no-go validation before a pipeline run
//! - **pipeline**: the entry points external triggers invoke
//!
//! The flow: a trigger invokes analysis, the availability gate decides
//! whether the run may start, session adapters supply transcripts, the
//! selected LLM adapter analyzes them into candidate observations, the
//! store deduplicates and persists them as `pending`. A review surface
//! approves or rejects; the promotion engine writes approved
//! observations through the enabled memory adapters and advances them
//! to `promoted`.

pub mod availability;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod pipeline;
pub mod promote;
pub mod registry;
pub mod session;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use availability::{validate_availability, AvailabilityReport};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use promote::{format_fragment, PromotionEngine};
pub use store::{IngestOutcome, ObservationStore, StoreStats};
pub use types::{
    AdapterAvailability, AdapterKind, AnalysisOutcome, Observation, ObservationDraft,
    ObservationState, PromotionOutcome, PromotionRecord, SessionRecord,
};
