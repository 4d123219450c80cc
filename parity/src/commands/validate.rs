// parity/src/commands/validate.rs
//
// USE CASE: Validate a rule's target against its source.

use anyhow::Context;
use std::path::PathBuf;

use parity_core::application::{TestStatus, ValidationEngine, ValidationReport};

use super::{Project, cancel_on_ctrl_c, grid, load_scenarios};

pub async fn execute(
    project_dir: PathBuf,
    rule: String,
    scenarios: Option<PathBuf>,
    no_report: bool,
) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let rule = project.rule(&rule)?;
    let scenarios = load_scenarios(scenarios.as_deref(), &rule)?;
    let (source, target) = project.stores().await?;

    println!(
        "🔍 Validating '{}' with {} scenario(s)...",
        rule.rule_name,
        scenarios.len()
    );

    let engine = ValidationEngine::new(source, target)
        .with_thresholds(project.config.validation.clone());
    let report = engine.validate(&rule, &scenarios, &cancel_on_ctrl_c()).await;

    print_report(&report);

    if !no_report {
        let path = report
            .write_to(&project.reports_dir())
            .context("Failed to write validation report")?;
        println!("📄 Report saved to {}", path.display());
    }

    if report.failed > 0 || report.errors > 0 {
        eprintln!(
            "\n❌ FAILURE. {} failed, {} errored out of {}.",
            report.failed, report.errors, report.total
        );
        std::process::exit(1);
    }
    println!("\n✨ SUCCESS! All {} scenario(s) passed.", report.total);
    Ok(())
}

pub fn status_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Pass => "✅ PASS",
        TestStatus::Fail => "❌ FAIL",
        TestStatus::Error => "💥 ERROR",
        TestStatus::Warning => "⚠️ WARNING",
    }
}

pub fn print_report(report: &ValidationReport) {
    let mut table = grid();
    table.set_header(vec![
        "Scenario",
        "Category",
        "Status",
        "Tested",
        "Expected",
        "Discrepancies",
    ]);
    for result in &report.results {
        let discrepancies = result
            .discrepancies
            .iter()
            .map(|d| d.kind.code())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            format!("{}\n{}", result.scenario_id, result.scenario_name),
            result.category.to_string(),
            status_label(result.status).to_string(),
            result.records_tested.to_string(),
            result.records_expected.to_string(),
            discrepancies,
        ]);
    }
    println!("{table}");
    println!(
        "📊 {} passed, {} failed, {} errors ({:.1}% pass rate, {:.2}s)",
        report.passed,
        report.failed,
        report.errors,
        report.pass_rate(),
        report.duration_seconds
    );
}
