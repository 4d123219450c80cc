// parity/src/commands/mod.rs
//
// Wiring shared by the subcommands: config -> stores -> rule -> transform.

pub mod inspect;
pub mod query;
pub mod rollback;
pub mod run;
pub mod scenarios;
pub mod snapshot;
pub mod validate;
pub mod workflow;

use anyhow::{Context, Result};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table as Grid};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use parity_core::application::RunRequest;
use parity_core::domain::data::Table;
use parity_core::domain::project::{ProjectConfig, StoreConfig};
use parity_core::domain::rule::{BusinessRule, TestScenario};
use parity_core::infrastructure::adapters::{DuckDbStore, SqlTransform};
use parity_core::infrastructure::config::{find_rule, load_project_config, load_rules};
use parity_core::infrastructure::scenarios::ScenarioCatalog;
use parity_core::ports::store::DataStore;
use parity_core::ports::transform::{Identity, Transform};

/// A loaded project: its directory and validated configuration.
pub struct Project {
    pub dir: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    pub fn load(dir: &Path) -> Result<Self> {
        println!("⚙️  Loading configuration...");
        let config = load_project_config(dir)
            .with_context(|| format!("Failed to load project configuration from {:?}", dir))?;
        match &config.version {
            Some(v) => println!("   Project: {} (v{})", config.name, v),
            None => println!("   Project: {}", config.name),
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            config,
        })
    }

    /// Database paths in the config are relative to the project directory.
    fn resolve(&self, store: &StoreConfig) -> StoreConfig {
        let mut resolved = store.clone();
        if store.path != ":memory:" && Path::new(&store.path).is_relative() {
            resolved.path = self.dir.join(&store.path).to_string_lossy().to_string();
        }
        resolved
    }

    async fn open(&self, store: &StoreConfig) -> Result<Arc<DuckDbStore>> {
        let store = self.resolve(store);
        let opened = DuckDbStore::open(&store, self.config.retry.clone())
            .await
            .with_context(|| format!("Failed to open DuckDB at {}", store.path))?;
        Ok(Arc::new(opened))
    }

    /// (source, target). One shared store when both point at the same file.
    pub async fn stores(&self) -> Result<(Arc<dyn DataStore>, Arc<dyn DataStore>)> {
        let source = self.open(&self.config.source).await?;
        if self.config.shares_database() {
            println!("   Engine: DuckDB 🦆 ({})", source.path());
            let shared: Arc<dyn DataStore> = source;
            return Ok((shared.clone(), shared));
        }
        let target = self.open(&self.config.target).await?;
        println!("   Engine: DuckDB 🦆 ({} -> {})", source.path(), target.path());
        let source: Arc<dyn DataStore> = source;
        let target: Arc<dyn DataStore> = target;
        Ok((source, target))
    }

    pub async fn source_store(&self) -> Result<Arc<dyn DataStore>> {
        Ok(self.open(&self.config.source).await?)
    }

    pub async fn target_store(&self) -> Result<Arc<dyn DataStore>> {
        Ok(self.open(&self.config.target).await?)
    }

    pub fn rule(&self, key: &str) -> Result<BusinessRule> {
        let rules_dir = self.dir.join(&self.config.rules_path);
        let rules = load_rules(&rules_dir)
            .with_context(|| format!("Failed to load rules from {:?}", rules_dir))?;
        find_rule(&rules, key)
            .cloned()
            .with_context(|| format!("Rule '{}' not found in {:?}", key, rules_dir))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.dir.join(&self.config.target_path)
    }

    pub fn run_request(&self, rule: &BusinessRule) -> Result<RunRequest> {
        let source = rule.primary_source()?;
        Ok(RunRequest::new(source, &rule.target_table).with_settings(self.config.pipeline.clone()))
    }
}

/// `--sql` wins; otherwise the rule's transformation_logic when it parses as
/// a SELECT; otherwise batches pass through unchanged.
pub fn resolve_transform(sql: Option<String>, rule: &BusinessRule) -> Result<Arc<dyn Transform>> {
    if let Some(sql) = sql {
        return Ok(Arc::new(SqlTransform::new(sql)?));
    }
    let logic = rule.transformation_logic.trim();
    if logic.is_empty() {
        return Ok(Arc::new(Identity));
    }
    match SqlTransform::new(logic) {
        Ok(t) => Ok(Arc::new(t)),
        Err(e) => {
            warn!(rule = %rule.rule_name, "transformation_logic is not SQL ({}), using identity", e);
            Ok(Arc::new(Identity))
        }
    }
}

pub fn load_scenarios(path: Option<&Path>, rule: &BusinessRule) -> Result<Vec<TestScenario>> {
    let catalog = ScenarioCatalog::new()?;
    let scenarios = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read scenarios from {:?}", path))?;
            catalog.parse_generated(&text, rule)?
        }
        None => catalog.default_scenarios(rule)?,
    };
    Ok(scenarios)
}

pub fn grid() -> Grid {
    let mut grid = Grid::new();
    grid.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    grid
}

/// Renders a data table, NULLs shown as `NULL`.
pub fn render_rows(table: &Table) -> Grid {
    let mut out = grid();
    out.set_header(table.columns.clone());
    for row in &table.rows {
        out.add_row(row.iter().map(ToString::to_string).collect::<Vec<_>>());
    }
    out
}

/// Token cancelled by the first Ctrl-C. In-flight work finishes first.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Cancellation requested, finishing the current step...");
            trigger.cancel();
        }
    });
    token
}
