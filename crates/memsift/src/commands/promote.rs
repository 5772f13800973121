//! Promotion command.

use anyhow::Result;
use colored::Colorize;
use memsift_core::Pipeline;

use crate::config::Config;

pub async fn execute(json: bool, config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(&config.pipeline)?;
    let outcome = pipeline.run_promotion()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("{}", "Promotion complete".cyan().bold());
    println!("  Promoted: {}", outcome.promoted.to_string().green());
    if outcome.skipped_targets > 0 {
        println!("  Targets already applied: {}", outcome.skipped_targets);
    }
    for failure in &outcome.failed {
        println!(
            "  {} {} -> {}: {}",
            "✗".red(),
            &failure.observation_id[..12.min(failure.observation_id.len())],
            failure.target_adapter,
            failure.reason
        );
    }
    if !outcome.failed.is_empty() {
        println!();
        println!(
            "  Failed observations stay {} and will be retried.",
            "approved".yellow()
        );
    }

    Ok(())
}
