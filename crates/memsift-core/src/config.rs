//! Pipeline configuration.
//!
//! The on-disk form and its read/write mechanics belong to the CLI
//! collaborator; the core only consumes a fully constructed value.
//! Every component receives the configuration at construction - there
//! is no ambient lookup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration consumed by the pipeline core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Session adapters to capture transcripts from
    #[serde(default = "default_session_adapters")]
    pub enabled_session_adapters: Vec<String>,

    /// Analysis backend; exactly one is selected
    #[serde(default = "default_llm_adapter")]
    pub selected_llm_adapter: String,

    /// Memory destinations, keyed by adapter name, value = enabled
    #[serde(default = "default_memory_targets")]
    pub memory_targets: BTreeMap<String, bool>,

    /// Upper bound for one external analysis call, in seconds
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,

    /// Directory holding the observation store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled_session_adapters: default_session_adapters(),
            selected_llm_adapter: default_llm_adapter(),
            memory_targets: default_memory_targets(),
            analysis_timeout_secs: default_analysis_timeout(),
            data_dir: default_data_dir(),
        }
    }
}

impl PipelineConfig {
    /// Path of the observation store database inside `data_dir`.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("observations.db")
    }

    /// Names of enabled memory targets, in stable order.
    pub fn enabled_memory_targets(&self) -> Vec<String> {
        self.memory_targets
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn default_session_adapters() -> Vec<String> {
    vec!["claude-code".to_string(), "opencode".to_string()]
}

fn default_llm_adapter() -> String {
    "claude-cli".to_string()
}

fn default_memory_targets() -> BTreeMap<String, bool> {
    let mut targets = BTreeMap::new();
    targets.insert("claude-md".to_string(), true);
    targets.insert("agents-md".to_string(), true);
    targets
}

fn default_analysis_timeout() -> u64 {
    120
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memsift")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.selected_llm_adapter, "claude-cli");
        assert_eq!(config.enabled_session_adapters.len(), 2);
        assert_eq!(config.analysis_timeout_secs, 120);
    }

    #[test]
    fn test_enabled_memory_targets_filters_disabled() {
        let mut config = PipelineConfig::default();
        config.memory_targets.insert("agents-md".to_string(), false);
        let enabled = config.enabled_memory_targets();
        assert_eq!(enabled, vec!["claude-md".to_string()]);
    }

    #[test]
    fn test_store_path_under_data_dir() {
        let config = PipelineConfig {
            data_dir: PathBuf::from("/tmp/memsift-test"),
            ..Default::default()
        };
        assert_eq!(
            config.store_path(),
            PathBuf::from("/tmp/memsift-test/observations.db")
        );
    }
}
