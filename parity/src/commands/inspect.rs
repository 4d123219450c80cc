// parity/src/commands/inspect.rs
//
// USE CASE: Inspect a table (schema + row count + sample rows).

use anyhow::bail;
use std::path::PathBuf;

use super::{Project, grid, render_rows};

pub async fn execute(
    project_dir: PathBuf,
    table: String,
    limit: usize,
    target: bool,
) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let store = if target {
        project.target_store().await?
    } else {
        project.source_store().await?
    };

    if !store.table_exists(&table).await? {
        bail!("❌ Table '{}' not found\n👉 Have you run 'parity run'?", table);
    }

    let rows = store.get_row_count(&table, &Default::default()).await?;
    println!("\n🔍 Inspecting Table: '{}' ({} rows, {})", table, rows, store.engine_name());

    let mut schema = grid();
    schema.set_header(vec!["Column", "Type", "Nullable"]);
    for column in store.get_schema(&table).await? {
        schema.add_row(vec![
            column.name,
            column.data_type,
            if column.is_nullable { "YES" } else { "NO" }.to_string(),
        ]);
    }
    println!("{schema}");

    let sample = store.sample(&table, limit).await?;
    println!("   --- Rows (Limit {}) ---", limit);
    println!("{}", render_rows(&sample));
    Ok(())
}
