//! Command implementations: build the workflow, submit, wait, report.

use crate::cli::{
    ProcessCsvArgs, ProcessDirectoryArgs, ProcessProductArgs, StartWorkflowArgs,
};
use crate::output::Printer;
use anyhow::Context;
use prodex_domain::DocumentRef;
use prodex_workflow::{Batch, WorkflowManager};
use std::time::Duration;

const WAIT_POLL: Duration = Duration::from_millis(250);

/// Process one product document and wait for the outcome.
pub async fn process_product(
    args: ProcessProductArgs,
    manager: &WorkflowManager,
    printer: &Printer,
) -> anyhow::Result<()> {
    let document = DocumentRef::File {
        path: args.document.clone(),
    };
    let id = manager
        .submit_product(&args.product_id, document, args.priority.into())
        .with_context(|| format!("submitting {}", args.product_id))?;

    manager.wait_for_job(id, WAIT_POLL).await;
    let job = manager
        .job(id)
        .context("job disappeared while waiting for it")?;
    printer.job_line(&job);
    Ok(())
}

/// Process every document in a directory and wait for the batch.
pub async fn process_directory(
    args: ProcessDirectoryArgs,
    manager: &WorkflowManager,
    printer: &Printer,
) -> anyhow::Result<()> {
    let batch = manager
        .submit_directory(&args.dir, args.priority.into())
        .with_context(|| format!("submitting directory {}", args.dir.display()))?;
    wait_and_report(manager, printer, &batch).await
}

/// Process every row of a CSV manifest and wait for the batch.
pub async fn process_csv(
    args: ProcessCsvArgs,
    manager: &WorkflowManager,
    printer: &Printer,
) -> anyhow::Result<()> {
    let batch = manager
        .submit_csv(&args.manifest, args.priority.into())
        .with_context(|| format!("submitting manifest {}", args.manifest.display()))?;
    wait_and_report(manager, printer, &batch).await
}

async fn wait_and_report(
    manager: &WorkflowManager,
    printer: &Printer,
    batch: &Batch,
) -> anyhow::Result<()> {
    println!("submitted {} jobs (batch {})", batch.job_ids.len(), batch.batch_id);
    let summary = manager.wait_for_batch(batch, WAIT_POLL).await;
    for id in &batch.job_ids {
        if let Some(job) = manager.job(*id) {
            printer.job_line(&job);
        }
    }
    printer.batch_summary(&summary);
    Ok(())
}

/// Run the workflow as a service until Ctrl-C.
pub async fn start_workflow(
    args: StartWorkflowArgs,
    manager: &WorkflowManager,
    printer: &Printer,
) -> anyhow::Result<()> {
    println!("workflow running; press Ctrl-C to stop");

    if args.status_interval_secs == 0 {
        tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    } else {
        let mut status = tokio::time::interval(Duration::from_secs(args.status_interval_secs));
        status.tick().await; // immediate first tick
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("waiting for Ctrl-C")?;
                    break;
                }
                _ = status.tick() => printer.status_line(&manager.status()),
            }
        }
    }

    println!("stopping...");
    Ok(())
}
