//! Claude Code session adapter.
//!
//! Claude Code writes one `.jsonl` transcript per session under
//! `~/.claude/projects/<project>/<session>.jsonl`. The session id is the
//! project directory plus the file stem.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::{collect_sessions, read_session_file, SessionAdapter};
use crate::error::Result;
use crate::types::{AdapterAvailability, AdapterKind, SessionRecord};

const ADAPTER_NAME: &str = "claude-code";
const TRANSCRIPT_EXT: &str = "jsonl";

/// Reads Claude Code transcripts from the tool's project storage.
pub struct ClaudeCodeSessions {
    root: PathBuf,
}

impl ClaudeCodeSessions {
    /// Adapter over the default storage root (`~/.claude/projects`).
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            root: home.join(".claude").join("projects"),
        }
    }

    /// Adapter over an explicit storage root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ClaudeCodeSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAdapter for ClaudeCodeSessions {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    fn is_available(&self) -> AdapterAvailability {
        if self.root.is_dir() {
            AdapterAvailability::available(ADAPTER_NAME, AdapterKind::Session)
        } else {
            AdapterAvailability::unavailable(
                ADAPTER_NAME,
                AdapterKind::Session,
                format!("session storage not found at {}", self.root.display()),
                "install Claude Code or run it once to create ~/.claude/projects",
            )
        }
    }

    fn list_sessions(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let found = collect_sessions(&self.root, TRANSCRIPT_EXT)?;
        Ok(found
            .into_iter()
            .filter(|(_, modified)| *modified > since)
            .map(|(id, _)| id)
            .collect())
    }

    fn read_session(&self, id: &str) -> Result<SessionRecord> {
        read_session_file(ADAPTER_NAME, &self.root, id, TRANSCRIPT_EXT)
    }
}
