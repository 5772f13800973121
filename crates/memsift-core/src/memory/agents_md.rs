//! Memory destination bound to the shared `AGENTS.md` convention.

use std::path::PathBuf;

use super::MemoryAdapter;

const ADAPTER_NAME: &str = "agents-md";

/// Appends promoted observations to `~/.config/agents/AGENTS.md`.
pub struct AgentsMdMemory {
    path: PathBuf,
}

impl AgentsMdMemory {
    /// Adapter over the default global memory file.
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: home.join(".config").join("agents").join("AGENTS.md"),
        }
    }

    /// Adapter over an explicit destination, for project-local memory
    /// files and tests.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for AgentsMdMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter for AgentsMdMemory {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}
