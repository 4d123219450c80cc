// parity/src/commands/run.rs
//
// USE CASE: Run the transformation pipeline for one rule.

use anyhow::{Context, bail};
use chrono::Utc;
use std::path::PathBuf;

use parity_core::application::{RunSummary, TransformationPipeline};
use parity_core::domain::project::ExecutionMode;
use parity_core::infrastructure::fs::{artifact_file_name, write_json_artifact};

use super::{Project, cancel_on_ctrl_c, grid, resolve_transform};

pub struct RunArgs {
    pub project_dir: PathBuf,
    pub rule: String,
    pub sql: Option<String>,
    pub batch_size: Option<usize>,
    pub partitioned: bool,
    pub no_rollback: bool,
}

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let project = Project::load(&args.project_dir)?;
    let rule = project.rule(&args.rule)?;
    let (source, target) = project.stores().await?;
    let transform = resolve_transform(args.sql, &rule)?;

    let mut request = project.run_request(&rule)?;
    if let Some(batch_size) = args.batch_size {
        if batch_size == 0 {
            bail!("--batch-size must be at least 1");
        }
        request.settings.batch_size = batch_size;
    }
    if args.partitioned {
        request.settings.mode = ExecutionMode::Partitioned;
    }
    if args.no_rollback {
        request.settings.enable_rollback = false;
    }

    println!(
        "🚀 Running '{}': {} -> {} ({} mode, transform: {})",
        rule.rule_name,
        request.source_table,
        request.target_table,
        request.settings.mode,
        transform.name()
    );

    let pipeline = TransformationPipeline::new(source, target);
    let cancel = cancel_on_ctrl_c();
    let result = pipeline.run(&request, transform.as_ref(), &cancel).await;

    let report = pipeline.get_execution_report();
    let file_name = artifact_file_name("run", &request.target_table, Utc::now());
    let path = write_json_artifact(&project.reports_dir(), &file_name, &report)
        .context("Failed to write execution report")?;

    match result {
        Ok(summary) => {
            print_summary(&summary);
            if let Some(snapshot) = &summary.snapshot_name {
                println!("📸 Rollback point: {}", snapshot);
            }
            println!("📄 Execution log saved to {}", path.display());
            println!("\n✨ SUCCESS! Pipeline finished in {:.2}s", summary.duration_seconds);
            Ok(())
        }
        Err(e) => {
            eprintln!("\n💥 PIPELINE FAILED: {}", e);
            let snapshot = report
                .execution_history
                .last()
                .and_then(|entry| entry.snapshot_name.clone());
            if let Some(snapshot) = snapshot {
                eprintln!(
                    "👉 Restore the previous state with: parity rollback -t {} -s {}",
                    request.target_table, snapshot
                );
            }
            std::process::exit(1);
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let mut table = grid();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Records processed".to_string(), summary.records_processed.to_string()]);
    table.add_row(vec!["Batches".to_string(), summary.batches.to_string()]);
    table.add_row(vec!["Mode".to_string(), summary.mode.to_string()]);
    table.add_row(vec![
        "Throughput".to_string(),
        format!("{:.0} rows/s", summary.throughput_rows_per_sec),
    ]);
    table.add_row(vec![
        "Snapshot".to_string(),
        summary.snapshot_name.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    println!("{table}");
}
