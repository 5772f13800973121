//! Analysis backend bound to the `claude` CLI.

use async_trait::async_trait;
use std::time::Duration;

use super::{build_analysis_prompt, parse_drafts, probe_executable, run_cli, LlmAdapter};
use crate::error::Result;
use crate::types::{AdapterAvailability, ObservationDraft, SessionRecord};

const ADAPTER_NAME: &str = "claude-cli";
const PROGRAM: &str = "claude";

/// Invokes the Claude Code CLI in non-interactive print mode.
pub struct ClaudeCliLlm {
    timeout: Duration,
}

impl ClaudeCliLlm {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl LlmAdapter for ClaudeCliLlm {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    fn is_available(&self) -> AdapterAvailability {
        probe_executable(ADAPTER_NAME, PROGRAM, "install the Claude Code CLI")
    }

    async fn analyze(&self, sessions: &[SessionRecord]) -> Result<Vec<ObservationDraft>> {
        let prompt = build_analysis_prompt(sessions);
        let raw = run_cli(ADAPTER_NAME, PROGRAM, &["-p"], &prompt, self.timeout).await?;
        parse_drafts(&raw)
    }
}
