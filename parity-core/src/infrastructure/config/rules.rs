// parity-core/src/infrastructure/config/rules.rs

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::domain::rule::BusinessRule;
use crate::infrastructure::error::InfrastructureError;

/// A rule file holds either one rule or a `rules:` list.
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Many { rules: Vec<BusinessRule> },
    One(BusinessRule),
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Every rule under `rules_dir`, sorted by rule id. A missing directory is an empty catalog.
#[instrument]
pub fn load_rules(rules_dir: &Path) -> Result<Vec<BusinessRule>, InfrastructureError> {
    if !rules_dir.exists() {
        debug!("No rules directory");
        return Ok(Vec::new());
    }

    let mut rules = Vec::new();
    for entry in WalkDir::new(rules_dir).follow_links(true) {
        let entry = entry.map_err(|e| InfrastructureError::Io(e.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_yaml(path) {
            continue;
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule file {:?}", path))?;
        let parsed: RuleFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse rule file {:?}", path))?;
        match parsed {
            RuleFile::Many { rules: many } => rules.extend(many),
            RuleFile::One(rule) => rules.push(rule),
        }
    }

    rules.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
    info!(count = rules.len(), "📚 Business rules loaded");
    Ok(rules)
}

/// Looks a rule up by id or by name.
pub fn find_rule<'a>(rules: &'a [BusinessRule], key: &str) -> Option<&'a BusinessRule> {
    rules.iter().find(|r| r.rule_id == key || r.rule_name == key)
}
