//! Configuration management for memsift.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (MEMSIFT_*)
//! 2. Config file (~/.memsift/config.toml)
//! 3. Default values
//!
//! The core pipeline never reads configuration ambiently; this module
//! builds the value the CLI passes in.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use memsift_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline settings consumed by memsift-core
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config: Config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("MEMSIFT_CONFIG") {
            return PathBuf::from(path);
        }
        if let Some(proj_dirs) = ProjectDirs::from("dev", "memsift", "memsift") {
            return proj_dirs.config_dir().join("config.toml");
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".memsift")
            .join("config.toml")
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("MEMSIFT_DATA_DIR") {
            self.pipeline.data_dir = PathBuf::from(dir);
        }
        if let Ok(llm) = std::env::var("MEMSIFT_LLM") {
            self.pipeline.selected_llm_adapter = llm;
        }
        if let Ok(secs) = std::env::var("MEMSIFT_ANALYSIS_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                self.pipeline.analysis_timeout_secs = secs;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(
            parsed.pipeline.selected_llm_adapter,
            config.pipeline.selected_llm_adapter
        );
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let parsed: Config =
            toml::from_str("[pipeline]\nselected_llm_adapter = \"opencode-cli\"\n").unwrap();
        assert_eq!(parsed.pipeline.selected_llm_adapter, "opencode-cli");
        assert_eq!(parsed.pipeline.analysis_timeout_secs, 120);
    }
}
