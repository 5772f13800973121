//! Core memory destinations.
//!
//! One concrete adapter per long-lived memory file consumed by a
//! downstream coding assistant. Adapters expose read/append only; they
//! never mutate observations and never format fragments themselves.

mod agents_md;
mod claude_md;

pub use agents_md::AgentsMdMemory;
pub use claude_md::ClaudeMdMemory;

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{AdapterAvailability, AdapterKind};

/// Capability set for memory persistence.
pub trait MemoryAdapter: Send + Sync {
    /// Stable adapter identifier, used as a registry key.
    fn name(&self) -> &'static str;

    /// Destination path. Pure - performs no I/O.
    fn path(&self) -> PathBuf;

    /// Bounded probe of the destination.
    fn is_available(&self) -> AdapterAvailability {
        let mut status = AdapterAvailability::available(self.name(), AdapterKind::Memory);
        if !self.path().exists() {
            status.detail = Some("destination will be created on first promotion".to_string());
        }
        status
    }

    /// Current destination content; empty when the file does not exist.
    fn read(&self) -> Result<String> {
        let path = self.path();
        if !path.exists() {
            return Ok(String::new());
        }
        std::fs::read_to_string(&path)
            .map_err(|e| Error::memory_write_failure(self.name(), e.to_string()))
    }

    /// Append one fragment, separated from existing content by a single
    /// blank line.
    fn append(&self, fragment: &str) -> Result<()> {
        append_atomic(self.name(), &self.path(), fragment)
    }
}

/// Append via write-to-temp-and-rename so a failure never leaves a
/// partial fragment visible. Existing content is never truncated or
/// reordered.
pub(crate) fn append_atomic(target: &'static str, path: &Path, fragment: &str) -> Result<()> {
    let fail = |reason: String| Error::memory_write_failure(target, reason);

    let parent = path
        .parent()
        .ok_or_else(|| fail(format!("destination {} has no parent", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;

    let mut combined = if path.exists() {
        std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?
    } else {
        String::new()
    };
    if !combined.is_empty() {
        while !combined.ends_with("\n\n") {
            combined.push('\n');
        }
    }
    combined.push_str(fragment);

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("memory");
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    if let Err(e) = std::fs::write(&tmp, &combined) {
        let _ = std::fs::remove_file(&tmp);
        return Err(fail(e.to_string()));
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(fail(e.to_string()));
    }

    Ok(())
}
