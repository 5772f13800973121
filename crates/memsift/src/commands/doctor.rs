//! Diagnostics command.
//!
//! Renders the availability validator's report; the core produces the
//! structured rows, this command only formats them.

use anyhow::Result;
use colored::Colorize;
use memsift_core::{AdapterKind, Pipeline};

use crate::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    println!("{}", "memsift Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    // Config file
    print!("  Config file: ");
    let config_path = Config::config_path();
    if config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Data directory
    print!("  Data directory: ");
    if config.pipeline.data_dir.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ will be created".yellow());
    }

    let pipeline = Pipeline::from_config(&config.pipeline)?;
    let report = pipeline.availability();

    let mut issues = Vec::new();

    for kind in [AdapterKind::Session, AdapterKind::Llm, AdapterKind::Memory] {
        println!();
        let heading = match kind {
            AdapterKind::Session => "Session adapters:",
            AdapterKind::Llm => "Analysis backend:",
            AdapterKind::Memory => "Memory targets:",
        };
        println!("  {}", heading.cyan());

        for status in report.statuses.iter().filter(|s| s.kind == kind) {
            print!("    {}: ", status.adapter_name);
            if status.available {
                match &status.detail {
                    Some(detail) => println!("{} ({})", "✓ available".green(), detail),
                    None => println!("{}", "✓ available".green()),
                }
            } else {
                println!(
                    "{}",
                    format!(
                        "✗ {}",
                        status.detail.as_deref().unwrap_or("unavailable")
                    )
                    .red()
                );
                if let Some(hint) = &status.remedy_hint {
                    issues.push(format!("{}: {hint}", status.adapter_name));
                }
            }
        }
    }

    println!();
    if report.fatal {
        println!(
            "{}",
            "✗ The selected analysis backend is unavailable; analysis cannot run."
                .red()
                .bold()
        );
    } else if report.degraded {
        println!(
            "{}",
            "! No session adapter is available; analysis will capture nothing new.".yellow()
        );
    } else {
        println!("{}", "✓ Pipeline is ready.".green().bold());
    }

    if !issues.is_empty() {
        println!();
        println!("  {}", "Suggestions:".cyan());
        for issue in issues {
            println!("    • {issue}");
        }
    }

    Ok(())
}
