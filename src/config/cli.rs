use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "restrict-check")]
#[command(about = "Bulk restricted-status checker for saved numbers")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "restrict-check.toml")]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Save numbers for an owner
    Add {
        #[arg(long)]
        owner: i64,
        /// Numbers, separated by commas, pipes, spaces or new lines
        #[arg(required = true, num_args = 1..)]
        numbers: Vec<String>,
    },
    /// List an owner's saved numbers
    List {
        #[arg(long)]
        owner: i64,
    },
    /// Remove all of an owner's saved numbers
    Clear {
        #[arg(long)]
        owner: i64,
    },
    /// Check every saved number
    Check {
        #[arg(long)]
        owner: i64,
    },
    /// Quick check of the given numbers, or of the saved ones when none are given
    Inline {
        #[arg(long)]
        owner: i64,
        query: Vec<String>,
    },
    /// Load and validate the configuration, then print a summary
    Validate,
}
