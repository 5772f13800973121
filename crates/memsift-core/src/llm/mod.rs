//! Analysis backends.
//!
//! An LLM adapter turns a batch of session transcripts into candidate
//! observation drafts. Invocation is a single bounded external call:
//! exceeding the configured timeout surfaces as `AnalysisTimeout` (one
//! bounded retry, then failure), and a response that does not parse into
//! well-formed drafts is `MalformedAnalysisResult` - no partial
//! observations are salvaged from a malformed batch.

mod claude_cli;
mod opencode_cli;

pub use claude_cli::ClaudeCliLlm;
pub use opencode_cli::OpenCodeCliLlm;

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{AdapterAvailability, ObservationDraft, SessionRecord};

/// Per-session transcript cap in the analysis prompt. Longer
/// transcripts keep only their tail; the most recent activity is what
/// carries observations.
const MAX_TRANSCRIPT_CHARS: usize = 24_000;

/// Capability set for analysis backends.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Stable adapter identifier, used as a registry key.
    fn name(&self) -> &'static str;

    /// Probe whether the backend executable is on the search path.
    fn is_available(&self) -> AdapterAvailability;

    /// Analyze transcripts into candidate observation drafts.
    ///
    /// Must not mutate its input.
    async fn analyze(&self, sessions: &[SessionRecord]) -> Result<Vec<ObservationDraft>>;
}

/// Build the analysis prompt shared by all CLI-backed adapters.
pub(crate) fn build_analysis_prompt(sessions: &[SessionRecord]) -> String {
    let mut prompt = String::from(
        "You are reviewing coding-session transcripts. Extract discrete, durable \
         observations worth remembering across future sessions: conventions, patterns, \
         gotchas, tool usage, user preferences.\n\
         Respond with ONLY a JSON array of objects, each with \"content\" (one concise \
         markdown-ready sentence), \"category\" (a short tag such as \"pattern\" or \
         \"gotcha\"), and \"session_id\" (copied verbatim from the session marker the \
         observation came from). Respond with [] if nothing is worth keeping.\n",
    );

    for session in sessions {
        let mut content = session.raw_content.as_str();
        if content.len() > MAX_TRANSCRIPT_CHARS {
            let cut = content.len() - MAX_TRANSCRIPT_CHARS;
            // Cut on a char boundary
            let mut start = cut;
            while !content.is_char_boundary(start) {
                start += 1;
            }
            content = &content[start..];
        }
        prompt.push_str(&format!(
            "\n--- session {} ({}) ---\n{}\n",
            session.session_id, session.source_adapter, content
        ));
    }

    prompt
}

/// Parse a backend response into observation drafts.
///
/// Accepts a bare JSON array, optionally wrapped in a single fenced code
/// block. Anything else, including drafts with empty content, fails the
/// whole batch.
pub(crate) fn parse_drafts(raw: &str) -> Result<Vec<ObservationDraft>> {
    let body = strip_code_fence(raw);
    let drafts: Vec<ObservationDraft> = serde_json::from_str(body)
        .map_err(|e| Error::MalformedAnalysisResult(e.to_string()))?;

    for draft in &drafts {
        if draft.content.trim().is_empty() {
            return Err(Error::MalformedAnalysisResult(
                "draft with empty content".to_string(),
            ));
        }
    }

    Ok(drafts)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(newline) = rest.find('\n') {
            let body = &rest[newline + 1..];
            if let Some(end) = body.rfind("```") {
                return body[..end].trim();
            }
        }
    }
    trimmed
}

/// Run one analysis subprocess with an enforced timeout and a single
/// retry after a timeout.
pub(crate) async fn run_cli(
    adapter: &'static str,
    program: &str,
    args: &[&str],
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    match run_cli_once(adapter, program, args, prompt, timeout).await {
        Err(Error::AnalysisTimeout { secs }) => {
            warn!(adapter, "analysis call timed out after {secs}s, retrying once");
            run_cli_once(adapter, program, args, prompt, timeout).await
        }
        other => other,
    }
}

async fn run_cli_once(
    adapter: &'static str,
    program: &str,
    args: &[&str],
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    debug!(adapter, program, "invoking analysis backend");

    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::AdapterUnavailable {
            name: adapter.to_string(),
            detail: format!("failed to spawn {program}: {e}"),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(prompt.as_bytes()).await?;
        drop(stdin);
    }

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| Error::AnalysisTimeout {
            secs: timeout.as_secs(),
        })??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::MalformedAnalysisResult(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `which`-based probe shared by CLI-backed adapters.
pub(crate) fn probe_executable(
    adapter: &'static str,
    program: &str,
    remedy: &str,
) -> AdapterAvailability {
    use crate::types::AdapterKind;
    match which::which(program) {
        Ok(_) => AdapterAvailability::available(adapter, AdapterKind::Llm),
        Err(e) => AdapterAvailability::unavailable(
            adapter,
            AdapterKind::Llm,
            format!("{program} not found on PATH: {e}"),
            remedy,
        ),
    }
}
