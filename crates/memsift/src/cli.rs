//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};

/// memsift - distill coding sessions into durable agent memory
///
/// Analyzes session transcripts into candidate observations, routes
/// them through review, and promotes approved observations into the
/// memory files your coding assistants read.
#[derive(Parser, Debug)]
#[command(name = "memsift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze recent sessions into pending observations
    Analyze {
        /// Output the structured result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Review pending observations (list, approve, reject)
    Review(ReviewCommand),

    /// Promote approved observations into memory files
    Promote {
        /// Output the structured result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Archive finished observations older than N days
    Housekeep {
        /// Age threshold in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Show observation counts by state
    Status,

    /// Run adapter availability diagnostics
    Doctor,

    /// Show version
    Version,
}

#[derive(Args, Debug)]
pub struct ReviewCommand {
    #[command(subcommand)]
    pub action: ReviewAction,
}

#[derive(Subcommand, Debug)]
pub enum ReviewAction {
    /// List observations awaiting review
    List {
        /// Show full observation ids
        #[arg(long)]
        full: bool,
    },

    /// Approve a pending observation
    Approve {
        /// Observation id (or unique prefix)
        id: String,
    },

    /// Reject a pending observation
    Reject {
        /// Observation id (or unique prefix)
        id: String,
    },
}
