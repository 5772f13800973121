//! Housekeeping command: archive finished observations.

use anyhow::Result;
use chrono::Duration;
use colored::Colorize;
use memsift_core::Pipeline;

use crate::config::Config;

pub async fn execute(days: i64, config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(&config.pipeline)?;
    let archived = pipeline.run_housekeeping(Duration::days(days))?;

    if archived == 0 {
        println!("Nothing to archive.");
    } else {
        println!(
            "{} archived {} finished observation(s) older than {} days",
            "✓".green(),
            archived,
            days
        );
    }

    Ok(())
}
