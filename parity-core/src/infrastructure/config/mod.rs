// parity-core/src/infrastructure/config/mod.rs

pub mod project;
pub mod rules;

pub use crate::domain::project::{ExecutionMode, PipelineSettings, ProjectConfig, StoreConfig};
pub use project::load_project_config;
pub use rules::{find_rule, load_rules};
