// parity/src/commands/snapshot.rs
//
// USE CASE: Take a rollback point of a target table by hand.

use anyhow::bail;
use chrono::Utc;
use std::path::PathBuf;

use parity_core::application::pipeline::snapshot_name;

use super::Project;

pub async fn execute(project_dir: PathBuf, table: String) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let store = project.target_store().await?;

    if !store.table_exists(&table).await? {
        bail!("❌ Table '{}' does not exist in the target database", table);
    }
    let name = snapshot_name(&table, Utc::now());
    store.create_snapshot(&table, &name).await?;
    let rows = store.get_row_count(&name, &Default::default()).await?;

    println!("📸 Snapshot created: {} ({} rows)", name, rows);
    println!("👉 Restore with: parity rollback -t {} -s {}", table, name);
    Ok(())
}
