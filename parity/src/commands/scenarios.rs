// parity/src/commands/scenarios.rs
//
// USE CASE: Show the scenarios a rule would be validated with.

use std::path::PathBuf;

use super::{Project, grid, load_scenarios};

pub fn execute(
    project_dir: PathBuf,
    rule: String,
    from: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let rule = project.rule(&rule)?;
    let scenarios = load_scenarios(from.as_deref(), &rule)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scenarios)?);
        return Ok(());
    }

    println!("📋 {} scenario(s) for '{}'", scenarios.len(), rule.rule_name);
    let mut table = grid();
    table.set_header(vec!["Id", "Name", "Category", "Expected rows", "Assertions"]);
    for s in &scenarios {
        table.add_row(vec![
            s.id().to_string(),
            s.name.clone(),
            s.category.to_string(),
            s.expected_record_count
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
            s.assertions.join("\n"),
        ]);
    }
    println!("{table}");
    Ok(())
}
