// parity-core/src/infrastructure/config/project.rs

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::project::ProjectConfig;
use crate::infrastructure::error::InfrastructureError;

const CONFIG_CANDIDATES: [&str; 2] = ["parity_project.yaml", "parity.yaml"];

#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project manifest");

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read project config at {:?}", config_path))?;
    let mut config: ProjectConfig = serde_yaml::from_str(&content)?;

    // Layering: file first, then environment (PARITY_BATCH_SIZE=500 parity run ...)
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config.validate()?;
    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    CONFIG_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.exists())
        .ok_or_else(|| {
            InfrastructureError::ConfigNotFound(format!(
                "{} (checked: {:?})",
                root.display(),
                CONFIG_CANDIDATES
            ))
        })
}

/// `lookup` is the environment; tests pass a map instead of mutating the process env.
fn apply_env_overrides<F>(config: &mut ProjectConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("PARITY_SOURCE_DB") {
        info!(old = ?config.source.path, new = ?val, "Overriding source database via ENV");
        config.source.path = val;
    }
    if let Some(val) = lookup("PARITY_TARGET_DB") {
        info!(old = ?config.target.path, new = ?val, "Overriding target database via ENV");
        config.target.path = val;
    }
    if let Some(val) = lookup("PARITY_BATCH_SIZE") {
        match val.parse::<usize>() {
            Ok(n) => {
                info!(old = config.pipeline.batch_size, new = n, "Overriding batch size via ENV");
                config.pipeline.batch_size = n;
            }
            Err(_) => warn!(value = ?val, "Ignoring PARITY_BATCH_SIZE: not a positive integer"),
        }
    }
    if let Some(val) = lookup("PARITY_TARGET_PATH") {
        info!(old = ?config.target_path, new = ?val, "Overriding target path via ENV");
        config.target_path = val;
    }
}
