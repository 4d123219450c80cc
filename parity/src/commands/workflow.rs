// parity/src/commands/workflow.rs
//
// USE CASE: Pipeline then validation, tracked as one background job.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

use parity_core::application::{
    JobManager, TransformationPipeline, ValidationEngine, ValidationReport,
};
use parity_core::domain::job::JobStatus;

use super::{Project, load_scenarios, resolve_transform};

pub async fn execute(
    project_dir: PathBuf,
    rule: String,
    sql: Option<String>,
    scenarios: Option<PathBuf>,
) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let rule = project.rule(&rule)?;
    let scenarios = load_scenarios(scenarios.as_deref(), &rule)?;
    let transform = resolve_transform(sql, &rule)?;
    let request = project.run_request(&rule)?;
    let (source, target) = project.stores().await?;

    let pipeline = Arc::new(TransformationPipeline::new(source.clone(), target.clone()));
    let validation = Arc::new(
        ValidationEngine::new(source, target).with_thresholds(project.config.validation.clone()),
    );
    let manager = JobManager::new(pipeline, validation);

    println!("🔁 Workflow '{}': run + {} scenario(s)", rule.rule_name, scenarios.len());
    let job = manager.submit_workflow(rule, request, transform, scenarios)?;
    let job_id = job.job_id;
    println!("   Job: {}", job_id);

    let registry = manager.registry().clone();
    tokio::select! {
        joined = job.join() => { joined?; }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n🛑 Cancellation requested, finishing the current step...");
            registry.cancel(job_id)?;
        }
    }
    // after a Ctrl-C the task may still be finishing its batch
    while !registry.get(job_id)?.status.is_terminal() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    let record = registry.get(job_id)?;
    let path = registry
        .export_summaries(&project.reports_dir())
        .context("Failed to write job summary")?;

    let report = record
        .result
        .as_ref()
        .and_then(|r| r.get("validation"))
        .and_then(|v| serde_json::from_value::<ValidationReport>(v.clone()).ok());
    if let Some(report) = &report {
        super::validate::print_report(report);
    }
    println!("📄 Job summary saved to {}", path.display());

    match record.status {
        JobStatus::Completed => {
            let clean = report.as_ref().is_some_and(|r| r.failed == 0 && r.errors == 0);
            if clean {
                println!(
                    "\n✨ SUCCESS! {} records moved, all scenarios passed.",
                    record.records_processed
                );
                return Ok(());
            }
            eprintln!(
                "\n❌ FAILURE. Data moved ({} records) but validation pass rate is {:.1}%.",
                record.records_processed,
                record.pass_rate.unwrap_or(0.0)
            );
            std::process::exit(1);
        }
        status => {
            eprintln!(
                "\n💥 WORKFLOW {}: {}",
                status,
                record.error.as_deref().unwrap_or("unknown error")
            );
            std::process::exit(1);
        }
    }
}
