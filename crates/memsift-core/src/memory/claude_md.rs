//! Memory destination bound to Claude Code's global `CLAUDE.md`.

use std::path::PathBuf;

use super::MemoryAdapter;

const ADAPTER_NAME: &str = "claude-md";

/// Appends promoted observations to `~/.claude/CLAUDE.md`.
pub struct ClaudeMdMemory {
    path: PathBuf,
}

impl ClaudeMdMemory {
    /// Adapter over the default global memory file.
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: home.join(".claude").join("CLAUDE.md"),
        }
    }

    /// Adapter over an explicit destination, for project-local memory
    /// files and tests.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ClaudeMdMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter for ClaudeMdMemory {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}
