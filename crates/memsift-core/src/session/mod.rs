//! Session capture adapters.
//!
//! One concrete adapter per external coding tool. Adapters expose raw
//! session transcripts; they never interpret them and never touch
//! observations.

mod claude_code;
mod opencode;

pub use claude_code::ClaudeCodeSessions;
pub use opencode::OpenCodeSessions;

use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{AdapterAvailability, SessionRecord};

/// Capability set for session capture.
///
/// `is_available` is a bounded filesystem probe; its result is cacheable
/// for the lifetime of one pipeline run. Per-session read failures are
/// non-fatal to a batch.
pub trait SessionAdapter: Send + Sync {
    /// Stable adapter identifier, used as a registry key.
    fn name(&self) -> &'static str;

    /// Probe whether the tool's session storage is present.
    fn is_available(&self) -> AdapterAvailability;

    /// List session ids with material captured after `since`.
    fn list_sessions(&self, since: DateTime<Utc>) -> Result<Vec<String>>;

    /// Read one session transcript.
    fn read_session(&self, id: &str) -> Result<SessionRecord>;
}

/// Recursively collect files under `root` with the given extension.
///
/// Returns relative session ids (path without extension, `/`-separated)
/// paired with their modification time.
pub(crate) fn collect_sessions(
    root: &Path,
    ext: &str,
) -> std::io::Result<Vec<(String, DateTime<Utc>)>> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some(ext) {
                let modified = modified_at(&path)?;
                if let Ok(rel) = path.with_extension("").strip_prefix(root) {
                    found.push((path_to_id(rel), modified));
                }
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

/// Resolve a session id back to a file path under `root`.
///
/// Rejects ids that would escape the storage root.
pub(crate) fn session_path(root: &Path, id: &str, ext: &str) -> Result<PathBuf> {
    let rel = PathBuf::from(id);
    if rel.components().any(|c| matches!(c, Component::ParentDir | Component::RootDir)) {
        return Err(Error::session_unreadable(id, "id escapes storage root"));
    }
    Ok(root.join(rel).with_extension(ext))
}

/// File modification time as UTC.
pub(crate) fn modified_at(path: &Path) -> std::io::Result<DateTime<Utc>> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

fn path_to_id(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Shared read implementation for file-backed session storage.
pub(crate) fn read_session_file(
    adapter: &'static str,
    root: &Path,
    id: &str,
    ext: &str,
) -> Result<SessionRecord> {
    let path = session_path(root, id, ext)?;
    let raw_content = std::fs::read_to_string(&path)
        .map_err(|e| Error::session_unreadable(id, e.to_string()))?;
    let captured_at =
        modified_at(&path).map_err(|e| Error::session_unreadable(id, e.to_string()))?;

    Ok(SessionRecord {
        source_adapter: adapter.to_string(),
        session_id: id.to_string(),
        captured_at,
        raw_content,
    })
}
