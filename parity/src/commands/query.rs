// parity/src/commands/query.rs
//
// USE CASE: Execute a raw SQL query (ad-hoc).

use std::path::PathBuf;

use parity_core::application::engine::execute_query;

use super::{Project, render_rows};

pub async fn execute(query: String, project_dir: PathBuf, target: bool) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let store = if target {
        project.target_store().await?
    } else {
        project.source_store().await?
    };

    let table = execute_query(store.as_ref(), &query, &[]).await?;
    println!("{}", render_rows(&table));
    println!("({} rows)", table.len());
    Ok(())
}
