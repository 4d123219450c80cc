// parity-core/src/domain/rule.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::DomainError;

/// A transformation intent, as produced by the rule parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRule {
    pub rule_id: String,
    pub rule_name: String,
    #[serde(default)]
    pub description: String,
    pub source_tables: Vec<String>,
    pub target_table: String,
    #[serde(default)]
    pub transformation_logic: String,
    #[serde(default)]
    pub validation_query: String,
    #[serde(default)]
    pub expected_behavior: String,
}

impl BusinessRule {
    /// The table validation samples on the source side.
    pub fn primary_source(&self) -> Result<&str, DomainError> {
        self.source_tables
            .first()
            .map(String::as_str)
            .ok_or_else(|| DomainError::MissingSourceTable(self.rule_name.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioCategory {
    HappyPath,
    EdgeCase,
    Boundary,
    DataQuality,
    Performance,
    Negative,
    #[default]
    #[serde(other)]
    General,
}

impl fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioCategory::HappyPath => "HAPPY_PATH",
            ScenarioCategory::EdgeCase => "EDGE_CASE",
            ScenarioCategory::Boundary => "BOUNDARY",
            ScenarioCategory::DataQuality => "DATA_QUALITY",
            ScenarioCategory::Performance => "PERFORMANCE",
            ScenarioCategory::Negative => "NEGATIVE",
            ScenarioCategory::General => "GENERAL",
        };
        f.write_str(s)
    }
}

/// One unit of test intent. Produced externally; `scenario_id` and
/// `validation_query` are filled in by [`TestScenario::complete`] when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScenario {
    #[serde(default)]
    pub scenario_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub category: ScenarioCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data_description: Option<String>,
    #[serde(default)]
    pub expected_output: String,
    #[serde(default)]
    pub validation_query: Option<String>,
    #[serde(default)]
    pub expected_record_count: Option<u64>,
    #[serde(default)]
    pub assertions: Vec<String>,
}

impl TestScenario {
    pub fn new(name: impl Into<String>, category: ScenarioCategory) -> Self {
        Self {
            scenario_id: None,
            name: name.into(),
            category,
            description: String::new(),
            input_data_description: None,
            expected_output: String::new(),
            validation_query: None,
            expected_record_count: None,
            assertions: Vec::new(),
        }
    }

    /// Fills the id (`TEST_{rule_id}_{n}`, 1-based) and validation query when missing.
    pub fn complete(mut self, rule: &BusinessRule, index: usize) -> Self {
        if self.scenario_id.as_deref().is_none_or(str::is_empty) {
            self.scenario_id = Some(format!("TEST_{}_{}", rule.rule_id, index + 1));
        }
        if self.validation_query.as_deref().is_none_or(str::is_empty) {
            self.validation_query = Some(rule.validation_query.clone());
        }
        self
    }

    pub fn id(&self) -> &str {
        self.scenario_id.as_deref().unwrap_or("UNKNOWN")
    }
}
