//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use prodex_queue::JobPriority;
use std::path::PathBuf;

/// Prodex - LLM-driven product data extraction.
#[derive(Debug, Parser)]
#[command(name = "prodex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract data for a single product document
    ProcessProduct(ProcessProductArgs),

    /// Extract data for every document in a directory
    ProcessDirectory(ProcessDirectoryArgs),

    /// Extract data for the products listed in a CSV manifest
    ProcessCsv(ProcessCsvArgs),

    /// Run the workflow as a long-lived service until interrupted
    StartWorkflow(StartWorkflowArgs),
}

/// Job priority accepted on the command line.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum CliPriority {
    /// Background work
    Low,
    /// Default priority
    #[default]
    Normal,
    /// Ahead of normal work
    High,
    /// Always first
    Critical,
}

impl From<CliPriority> for JobPriority {
    fn from(p: CliPriority) -> Self {
        match p {
            CliPriority::Low => JobPriority::Low,
            CliPriority::Normal => JobPriority::Normal,
            CliPriority::High => JobPriority::High,
            CliPriority::Critical => JobPriority::Critical,
        }
    }
}

/// Arguments for the process-product command.
#[derive(Debug, Parser)]
pub struct ProcessProductArgs {
    /// Product identifier
    pub product_id: String,

    /// Path to the product document
    pub document: PathBuf,

    /// Job priority
    #[arg(short, long, value_enum, default_value_t = CliPriority::Normal)]
    pub priority: CliPriority,
}

/// Arguments for the process-directory command.
#[derive(Debug, Parser)]
pub struct ProcessDirectoryArgs {
    /// Directory of product documents (file stem becomes the product id)
    pub dir: PathBuf,

    /// Job priority for every document
    #[arg(short, long, value_enum, default_value_t = CliPriority::Normal)]
    pub priority: CliPriority,
}

/// Arguments for the process-csv command.
#[derive(Debug, Parser)]
pub struct ProcessCsvArgs {
    /// CSV manifest with a `product_id` column and `document_path` or `text`
    pub manifest: PathBuf,

    /// Default priority for rows without a `priority` column
    #[arg(short, long, value_enum, default_value_t = CliPriority::Normal)]
    pub priority: CliPriority,
}

/// Arguments for the start-workflow command.
#[derive(Debug, Parser)]
pub struct StartWorkflowArgs {
    /// Seconds between status lines (0 disables them)
    #[arg(long, default_value_t = 30)]
    pub status_interval_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_process_product_parses() {
        let cli = Cli::parse_from([
            "prodex",
            "process-product",
            "PX-1",
            "doc.txt",
            "--priority",
            "high",
        ]);
        match cli.command {
            Command::ProcessProduct(args) => {
                assert_eq!(args.product_id, "PX-1");
                assert_eq!(JobPriority::from(args.priority), JobPriority::High);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_priority_defaults_to_normal() {
        let cli = Cli::parse_from(["prodex", "process-csv", "manifest.csv"]);
        match cli.command {
            Command::ProcessCsv(args) => {
                assert_eq!(JobPriority::from(args.priority), JobPriority::Normal);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
