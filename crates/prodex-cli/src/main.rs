//! Prodex CLI - submit product documents for LLM extraction.

mod cli;
mod commands;
mod output;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use output::Printer;
use prodex_workflow::{ProdexConfig, WorkflowManager};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let config = match &args.config {
        Some(path) => {
            ProdexConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => ProdexConfig::default(),
    };

    let printer = Printer::new(!args.no_color);
    let manager =
        WorkflowManager::with_extraction_pipeline(config).context("building workflow")?;
    manager.start().context("starting workflow")?;

    let outcome = match args.command {
        Command::ProcessProduct(a) => commands::process_product(a, &manager, &printer).await,
        Command::ProcessDirectory(a) => commands::process_directory(a, &manager, &printer).await,
        Command::ProcessCsv(a) => commands::process_csv(a, &manager, &printer).await,
        Command::StartWorkflow(a) => commands::start_workflow(a, &manager, &printer).await,
    };

    let interrupted = manager.stop(true).await.context("stopping workflow")?;
    if !interrupted.is_empty() {
        println!(
            "{} in-flight jobs requeued for the next start",
            interrupted.len()
        );
    }
    outcome
}
