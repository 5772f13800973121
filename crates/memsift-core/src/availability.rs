//! Availability validation gate.
//!
//! Runs every configured adapter's bounded probe before a pipeline run.
//! Policy: losing every session adapter only degrades the run (no new
//! material); losing the selected LLM adapter is a hard failure and
//! analysis must not start. The validator produces structured data only;
//! rendering belongs to the CLI collaborator.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::llm::LlmAdapter;
use crate::memory::MemoryAdapter;
use crate::session::SessionAdapter;
use crate::types::{AdapterAvailability, AdapterKind};

/// Go/no-go report for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct AvailabilityReport {
    /// One row per configured adapter
    pub statuses: Vec<AdapterAvailability>,
    /// No session adapter is available; analysis yields no new material
    pub degraded: bool,
    /// The selected LLM adapter is unavailable; analysis must not start
    pub fatal: bool,
}

impl AvailabilityReport {
    /// Whether the named adapter of the given kind probed available.
    pub fn available(&self, kind: AdapterKind, name: &str) -> bool {
        self.statuses
            .iter()
            .any(|s| s.kind == kind && s.adapter_name == name && s.available)
    }

    /// Enforce the hard-failure policy before an analysis batch.
    pub fn gate_analysis(&self) -> Result<()> {
        if !self.fatal {
            return Ok(());
        }
        let status = self
            .statuses
            .iter()
            .find(|s| s.kind == AdapterKind::Llm && !s.available);
        Err(Error::AdapterUnavailable {
            name: status
                .map(|s| s.adapter_name.clone())
                .unwrap_or_else(|| "llm".to_string()),
            detail: status
                .and_then(|s| s.detail.clone())
                .unwrap_or_else(|| "selected LLM adapter unavailable".to_string()),
        })
    }
}

/// Probe all configured adapters and apply the gating policy.
pub fn validate_availability(
    session_adapters: &[Arc<dyn SessionAdapter>],
    llm: &dyn LlmAdapter,
    memory_adapters: &[Arc<dyn MemoryAdapter>],
) -> AvailabilityReport {
    let mut statuses = Vec::new();

    for adapter in session_adapters {
        statuses.push(adapter.is_available());
    }
    let llm_status = llm.is_available();
    let fatal = !llm_status.available;
    statuses.push(llm_status);
    for adapter in memory_adapters {
        statuses.push(adapter.is_available());
    }

    let degraded = !statuses
        .iter()
        .any(|s| s.kind == AdapterKind::Session && s.available);

    AvailabilityReport {
        statuses,
        degraded,
        fatal,
    }
}
