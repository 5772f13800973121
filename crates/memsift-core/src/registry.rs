//! Adapter registry.
//!
//! Maps the fixed set of adapter identifiers to their concrete
//! implementations. Names are validated against configuration once, at
//! startup, never per call.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::llm::{ClaudeCliLlm, LlmAdapter, OpenCodeCliLlm};
use crate::memory::{AgentsMdMemory, ClaudeMdMemory, MemoryAdapter};
use crate::session::{ClaudeCodeSessions, OpenCodeSessions, SessionAdapter};

/// Known session adapter names.
pub const SESSION_ADAPTERS: &[&str] = &["claude-code", "opencode"];
/// Known LLM adapter names.
pub const LLM_ADAPTERS: &[&str] = &["claude-cli", "opencode-cli"];
/// Known memory adapter names.
pub const MEMORY_ADAPTERS: &[&str] = &["claude-md", "agents-md"];

/// Fully resolved adapter set for one pipeline.
pub struct AdapterSet {
    pub sessions: Vec<Arc<dyn SessionAdapter>>,
    pub llm: Arc<dyn LlmAdapter>,
    pub memories: Vec<Arc<dyn MemoryAdapter>>,
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet")
            .field("sessions", &self.sessions.len())
            .field("memories", &self.memories.len())
            .finish()
    }
}

/// Resolve every adapter named in the configuration.
///
/// Unknown names anywhere in the configuration fail fast, including
/// disabled memory targets.
pub fn resolve(config: &PipelineConfig) -> Result<AdapterSet> {
    let mut sessions = Vec::new();
    for name in &config.enabled_session_adapters {
        sessions.push(session_adapter(name)?);
    }

    let llm = llm_adapter(&config.selected_llm_adapter, config.analysis_timeout_secs)?;

    let mut memories = Vec::new();
    for (name, enabled) in &config.memory_targets {
        let adapter = memory_adapter(name)?;
        if *enabled {
            memories.push(adapter);
        }
    }

    Ok(AdapterSet {
        sessions,
        llm,
        memories,
    })
}

fn session_adapter(name: &str) -> Result<Arc<dyn SessionAdapter>> {
    match name {
        "claude-code" => Ok(Arc::new(ClaudeCodeSessions::new())),
        "opencode" => Ok(Arc::new(OpenCodeSessions::new())),
        other => Err(Error::UnknownAdapter(other.to_string())),
    }
}

fn llm_adapter(name: &str, timeout_secs: u64) -> Result<Arc<dyn LlmAdapter>> {
    match name {
        "claude-cli" => Ok(Arc::new(ClaudeCliLlm::new(timeout_secs))),
        "opencode-cli" => Ok(Arc::new(OpenCodeCliLlm::new(timeout_secs))),
        other => Err(Error::UnknownAdapter(other.to_string())),
    }
}

fn memory_adapter(name: &str) -> Result<Arc<dyn MemoryAdapter>> {
    match name {
        "claude-md" => Ok(Arc::new(ClaudeMdMemory::new())),
        "agents-md" => Ok(Arc::new(AgentsMdMemory::new())),
        other => Err(Error::UnknownAdapter(other.to_string())),
    }
}
