// parity/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parity")]
#[command(about = "Batched ETL with rollback snapshots and statistical source/target validation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🚀 Moves a rule's source table into its target (extract -> transform -> load)
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Rule id or name (from rules/*.yaml)
        #[arg(long, short)]
        rule: String,

        /// SELECT applied to each batch, exposed as table `batch`.
        /// Defaults to the rule's transformation_logic when it is SQL.
        #[arg(long)]
        sql: Option<String>,

        /// Override pipeline.batch_size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Split the source by pipeline.partition_column and load in parallel
        #[arg(long)]
        partitioned: bool,

        /// Skip the pre-run snapshot of the target
        #[arg(long)]
        no_rollback: bool,
    },

    /// 🔍 Validates a rule's target against its source
    Validate {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        rule: String,

        /// Generated scenarios (JSON, optionally inside a ``` fence).
        /// The default catalog is used when absent or unparseable.
        #[arg(long)]
        scenarios: Option<PathBuf>,

        /// Do not write the JSON report under target-path
        #[arg(long)]
        no_report: bool,
    },

    /// 🔁 Runs the pipeline then validation, as one tracked job (Ctrl-C cancels)
    Workflow {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        rule: String,

        #[arg(long)]
        sql: Option<String>,

        #[arg(long)]
        scenarios: Option<PathBuf>,
    },

    /// 📸 Takes a snapshot of a target table
    Snapshot {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        table: String,
    },

    /// ⏪ Restores a target table from a snapshot
    Rollback {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        table: String,

        /// Snapshot table name (as printed by `run` or `snapshot`)
        #[arg(long, short)]
        snapshot: String,

        /// Drop the snapshot table after a successful restore
        #[arg(long)]
        cleanup: bool,
    },

    /// ⚡ Executes a raw SQL query (Ad-hoc)
    Query {
        query: String,

        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Run against the target database instead of the source
        #[arg(long)]
        target: bool,
    },

    /// 🕵️ Inspects a table (schema, row count, sample rows)
    Inspect {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        table: String,

        /// Number of sample rows to display
        #[arg(long, default_value = "5")]
        limit: usize,

        #[arg(long)]
        target: bool,
    },

    /// 📋 Prints the test scenarios a rule would be validated with
    Scenarios {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        #[arg(long, short)]
        rule: String,

        #[arg(long)]
        from: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}
