//! Status command: observation counts by state.

use anyhow::Result;
use colored::Colorize;
use memsift_core::Pipeline;

use crate::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(&config.pipeline)?;
    let stats = pipeline.store().stats()?;

    println!("{}", "memsift status".cyan().bold());
    println!("  Pending:  {}", stats.pending.to_string().yellow());
    println!("  Approved: {}", stats.approved);
    println!("  Promoted: {}", stats.promoted.to_string().green());
    println!("  Rejected: {}", stats.rejected);
    println!("  Archived: {}", stats.archived.to_string().dimmed());
    println!("  Total:    {}", stats.total());

    Ok(())
}
