//! Review commands: list pending observations, approve, reject.
//!
//! Approval and promotion stay separate steps - approving here never
//! writes a memory file; run `memsift promote` for that.

use anyhow::{bail, Result};
use colored::Colorize;
use memsift_core::{ObservationState, Pipeline};

use crate::cli::{ReviewAction, ReviewCommand};
use crate::config::Config;

pub async fn execute(cmd: ReviewCommand, config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(&config.pipeline)?;

    match cmd.action {
        ReviewAction::List { full } => list(&pipeline, full),
        ReviewAction::Approve { id } => {
            let id = resolve_id(&pipeline, &id)?;
            pipeline.approve(&id)?;
            println!("{} approved {}", "✓".green(), short(&id));
            Ok(())
        }
        ReviewAction::Reject { id } => {
            let id = resolve_id(&pipeline, &id)?;
            pipeline.reject(&id)?;
            println!("{} rejected {}", "✓".green(), short(&id));
            Ok(())
        }
    }
}

fn list(pipeline: &Pipeline, full: bool) -> Result<()> {
    let pending = pipeline.store().list_by_state(ObservationState::Pending)?;

    if pending.is_empty() {
        println!("No observations awaiting review.");
        return Ok(());
    }

    println!("{}", "Pending observations".cyan().bold());
    for obs in &pending {
        let id = if full { obs.id.clone() } else { short(&obs.id) };
        println!(
            "  {}  [{}]  {}",
            id.yellow(),
            obs.category,
            obs.content.lines().next().unwrap_or_default()
        );
        println!(
            "      from {} ({})",
            obs.source_session_id,
            obs.source_adapter.dimmed()
        );
    }
    println!();
    println!(
        "  {} / {} to decide.",
        "memsift review approve <id>".cyan(),
        "memsift review reject <id>".cyan()
    );

    Ok(())
}

/// Resolve a full id or unique prefix against pending observations.
fn resolve_id(pipeline: &Pipeline, prefix: &str) -> Result<String> {
    let pending = pipeline.store().list_by_state(ObservationState::Pending)?;
    let matches: Vec<_> = pending
        .iter()
        .filter(|obs| obs.id.starts_with(prefix))
        .collect();

    match matches.len() {
        0 => bail!("no pending observation matches '{prefix}'"),
        1 => Ok(matches[0].id.clone()),
        n => bail!("'{prefix}' is ambiguous ({n} matches); use a longer prefix"),
    }
}

fn short(id: &str) -> String {
    id.chars().take(12).collect()
}
