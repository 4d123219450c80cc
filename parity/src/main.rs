// parity/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::run::RunArgs;
use parity_core::ParityError;

#[tokio::main]
async fn main() {
    // RUST_LOG=parity_core=debug parity run ... to see batch-level details.
    // Logs go to stderr; stdout carries the progress lines and tables.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = dispatch(cli.command).await {
        match render_diagnostic(&err) {
            Some(report) => eprintln!("{report}"),
            None => eprintln!("❌ {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        // --- USE CASE: RUN PIPELINE ---
        Commands::Run {
            project_dir,
            rule,
            sql,
            batch_size,
            partitioned,
            no_rollback,
        } => {
            commands::run::execute(RunArgs {
                project_dir,
                rule,
                sql,
                batch_size,
                partitioned,
                no_rollback,
            })
            .await
        }

        // --- USE CASE: VALIDATE ---
        Commands::Validate {
            project_dir,
            rule,
            scenarios,
            no_report,
        } => commands::validate::execute(project_dir, rule, scenarios, no_report).await,

        // --- USE CASE: RUN + VALIDATE AS A JOB ---
        Commands::Workflow {
            project_dir,
            rule,
            sql,
            scenarios,
        } => commands::workflow::execute(project_dir, rule, sql, scenarios).await,

        // --- USE CASE: SNAPSHOTS ---
        Commands::Snapshot { project_dir, table } => {
            commands::snapshot::execute(project_dir, table).await
        }
        Commands::Rollback {
            project_dir,
            table,
            snapshot,
            cleanup,
        } => commands::rollback::execute(project_dir, table, snapshot, cleanup).await,

        // --- USE CASE: AD-HOC ---
        Commands::Query {
            query,
            project_dir,
            target,
        } => commands::query::execute(query, project_dir, target).await,
        Commands::Inspect {
            project_dir,
            table,
            limit,
            target,
        } => commands::inspect::execute(project_dir, table, limit, target).await,

        Commands::Scenarios {
            project_dir,
            rule,
            from,
            json,
        } => commands::scenarios::execute(project_dir, rule, from, json),
    }
}

/// Library errors carry miette codes and help; render those when present.
fn render_diagnostic(err: &anyhow::Error) -> Option<String> {
    let parity = err.chain().find_map(|cause| cause.downcast_ref::<ParityError>())?;
    let diagnostic = diagnostic_of(parity)?;
    let mut out = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        .with_width(200)
        .render_report(&mut out, diagnostic)
        .ok()?;
    Some(out)
}

fn diagnostic_of(err: &ParityError) -> Option<&dyn Diagnostic> {
    match err {
        ParityError::Domain(e) => Some(e),
        ParityError::Infrastructure(e) => Some(e),
        ParityError::RunFailed { source, .. } => diagnostic_of(source),
        ParityError::InternalError(_) => None,
    }
}
