//! OpenCode session adapter.
//!
//! OpenCode persists session state as `.json` documents under
//! `~/.local/share/opencode/storage/session/`. The session id is the
//! path relative to the storage root, without the extension.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::{collect_sessions, read_session_file, SessionAdapter};
use crate::error::Result;
use crate::types::{AdapterAvailability, AdapterKind, SessionRecord};

const ADAPTER_NAME: &str = "opencode";
const SESSION_EXT: &str = "json";

/// Reads OpenCode session documents from the tool's storage directory.
pub struct OpenCodeSessions {
    root: PathBuf,
}

impl OpenCodeSessions {
    /// Adapter over the default storage root.
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            root: home
                .join(".local")
                .join("share")
                .join("opencode")
                .join("storage")
                .join("session"),
        }
    }

    /// Adapter over an explicit storage root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for OpenCodeSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAdapter for OpenCodeSessions {
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
                "install OpenCode or run it once to create its storage directory",
            )
        }
    }

    fn list_sessions(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let found = collect_sessions(&self.root, SESSION_EXT)?;
        Ok(found
            .into_iter()
            .filter(|(_, modified)| *modified > since)
            .map(|(id, _)| id)
            .collect())
    }

    fn read_session(&self, id: &str) -> Result<SessionRecord> {
        read_session_file(ADAPTER_NAME, &self.root, id, SESSION_EXT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_and_read() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("global")).unwrap();
        std::fs::write(
            dir.path().join("global/ses_xyz.json"),
            r#"{"title":"fix retries"}"#,
        )
        .unwrap();

        let adapter = OpenCodeSessions::with_root(dir.path());
        let ids = adapter.list_sessions(DateTime::UNIX_EPOCH).unwrap();
        assert_eq!(ids, vec!["global/ses_xyz"]);

        let record = adapter.read_session(&ids[0]).unwrap();
        assert_eq!(record.source_adapter, "opencode");
        assert!(record.raw_content.contains("fix retries"));
    }

    #[test]
    fn test_unavailable_without_storage_dir() {
        let dir = tempdir().unwrap();
        let adapter = OpenCodeSessions::with_root(dir.path().join("absent"));
        assert!(!adapter.is_available().available);
    }
}
