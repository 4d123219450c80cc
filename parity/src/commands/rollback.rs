// parity/src/commands/rollback.rs
//
// USE CASE: Restore a target table from a snapshot.

use std::path::PathBuf;

use super::Project;

pub async fn execute(
    project_dir: PathBuf,
    table: String,
    snapshot: String,
    cleanup: bool,
) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let store = project.target_store().await?;

    println!("⏪ Restoring '{}' from '{}'...", table, snapshot);
    store.rollback(&table, &snapshot).await?;
    let rows = store.get_row_count(&table, &Default::default()).await?;
    println!("✅ Rolled back: '{}' now has {} rows", table, rows);

    if cleanup {
        store.drop_table(&snapshot).await?;
        println!("🧹 Dropped snapshot '{}'", snapshot);
    }
    Ok(())
}
