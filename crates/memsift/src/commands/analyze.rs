//! Analysis command.

use anyhow::Result;
use colored::Colorize;
use memsift_core::Pipeline;

use crate::config::Config;

pub async fn execute(json: bool, config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(&config.pipeline)?;
    let outcome = pipeline.run_analysis().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("{}", "Analysis complete".cyan().bold());
    if outcome.degraded {
        println!(
            "  {} no session adapter available, no new material captured",
            "!".yellow()
        );
    }
    println!("  Sessions analyzed: {}", outcome.sessions_analyzed);
    println!("  Observations ingested: {}", outcome.ingested.to_string().green());
    if outcome.deduped > 0 {
        println!("  Duplicates skipped: {}", outcome.deduped);
    }
    if outcome.sessions_failed > 0 {
        println!(
            "  Unreadable sessions: {}",
            outcome.sessions_failed.to_string().yellow()
        );
    }
    for failure in &outcome.failures {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failure.adapter,
            failure.reason
        );
    }

    if outcome.ingested > 0 {
        println!();
        println!("  Run {} to review.", "memsift review list".cyan());
    }

    Ok(())
}
