// parity-core/src/infrastructure/scenarios.rs

// Default scenario set, used when no generated scenarios are available, and
// the parser for generated scenario text.

use minijinja::{Environment, context};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::domain::error::DomainError;
use crate::domain::rule::{BusinessRule, TestScenario};
use crate::infrastructure::error::InfrastructureError;

const DEFAULT_TEMPLATE_NAME: &str = "default_scenarios";

// Rendered to YAML, so every interpolated value goes through `tojson`.
const DEFAULT_TEMPLATE: &str = r#"
- scenario_id: {{ (rule_id ~ "_HAPPY_001") | tojson }}
  name: "Happy Path - Standard Data"
  category: HAPPY_PATH
  description: "Test transformation with valid, standard dataset"
  input_data_description: {{ ("Sample of records from " ~ source_table) | tojson }}
  expected_output: {{ ("Transformed data in " ~ target_table) | tojson }}
  validation_query: {{ validation_query | tojson }}
  expected_record_count: 100
  assertions:
    - "All records transformed successfully"
    - "No NULL values in required fields"
    - "Data types match target schema"
- scenario_id: {{ (rule_id ~ "_EDGE_001") | tojson }}
  name: "Edge Case - Empty Dataset"
  category: EDGE_CASE
  description: "Test behavior with empty source data"
  input_data_description: "Empty table or filtered to 0 records"
  expected_output: "No records in target or appropriate handling"
  validation_query: {{ ("SELECT COUNT(*) FROM " ~ target_table) | tojson }}
  expected_record_count: 0
  assertions:
    - "Process completes without errors"
    - "No orphaned data created"
- scenario_id: {{ (rule_id ~ "_EDGE_002") | tojson }}
  name: "Edge Case - NULL Values"
  category: EDGE_CASE
  description: "Test handling of NULL values in source data"
  input_data_description: "Records with NULL in various columns"
  expected_output: "NULLs handled per business rules"
  validation_query: {{ validation_query | tojson }}
  expected_record_count: 50
  assertions:
    - "NULLs handled appropriately"
    - "No errors from NULL processing"
- scenario_id: {{ (rule_id ~ "_QUALITY_001") | tojson }}
  name: "Data Quality - Duplicates"
  category: DATA_QUALITY
  description: "Test handling of duplicate records"
  input_data_description: "Dataset with duplicate rows"
  expected_output: "Duplicates handled per business logic"
  validation_query: {{ ("SELECT COUNT(*), COUNT(DISTINCT *) FROM " ~ target_table) | tojson }}
  expected_record_count: 100
  assertions:
    - "Duplicates identified"
    - "Deduplication logic applied correctly"
- scenario_id: {{ (rule_id ~ "_PERF_001") | tojson }}
  name: "Performance - Large Volume"
  category: PERFORMANCE
  description: "Test with large dataset (10K+ records)"
  input_data_description: "Large volume of records"
  expected_output: "All records processed efficiently"
  validation_query: {{ ("SELECT COUNT(*) FROM " ~ target_table) | tojson }}
  expected_record_count: 10000
  assertions:
    - "Processing completes within SLA"
    - "Memory usage acceptable"
    - "No performance degradation"
- scenario_id: {{ (rule_id ~ "_BOUND_001") | tojson }}
  name: "Boundary - Min/Max Values"
  category: BOUNDARY
  description: "Test with boundary values (min/max)"
  input_data_description: "Records with extreme values"
  expected_output: "Boundary values handled correctly"
  validation_query: {{ validation_query | tojson }}
  expected_record_count: 10
  assertions:
    - "No overflow/underflow errors"
    - "Boundary conditions met"
"#;

static FENCED_BLOCK: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```"));

pub struct ScenarioCatalog {
    env: Environment<'static>,
}

impl ScenarioCatalog {
    pub fn new() -> Result<Self, InfrastructureError> {
        let mut env = Environment::new();
        env.add_template(DEFAULT_TEMPLATE_NAME, DEFAULT_TEMPLATE)?;
        Ok(Self { env })
    }

    /// The six fallback scenarios, parameterised by the rule's tables and query.
    pub fn default_scenarios(&self, rule: &BusinessRule) -> Result<Vec<TestScenario>, InfrastructureError> {
        let source_table = rule.primary_source().map_err(|e| InfrastructureError::ConfigError(e.to_string()))?;
        let rendered = self.env.get_template(DEFAULT_TEMPLATE_NAME)?.render(context! {
            rule_id => &rule.rule_id,
            source_table => source_table,
            target_table => &rule.target_table,
            validation_query => &rule.validation_query,
        })?;
        let scenarios: Vec<TestScenario> = serde_yaml::from_str(&rendered)?;
        info!(rule = %rule.rule_name, count = scenarios.len(), "Using default test scenario templates");
        Ok(scenarios)
    }

    /// Scenarios from generator output (a JSON array, possibly inside a
    /// fenced code block). Unparseable output falls back to the defaults.
    pub fn parse_generated(&self, text: &str, rule: &BusinessRule) -> Result<Vec<TestScenario>, InfrastructureError> {
        match parse_json_scenarios(text) {
            Ok(scenarios) => Ok(scenarios
                .into_iter()
                .enumerate()
                .map(|(i, s)| s.complete(rule, i))
                .collect()),
            Err(e) => {
                warn!(error = %e, "Failed to parse generated scenarios, using defaults");
                self.default_scenarios(rule)
            }
        }
    }
}

fn parse_json_scenarios(text: &str) -> Result<Vec<TestScenario>, DomainError> {
    let trimmed = text.trim();
    let body = match FENCED_BLOCK.as_ref() {
        Ok(re) => re
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map_or(trimmed, |m| m.as_str().trim()),
        Err(_) => trimmed,
    };
    let scenarios: Vec<TestScenario> =
        serde_json::from_str(body).map_err(|e| DomainError::InvalidScenario(e.to_string()))?;
    if scenarios.is_empty() {
        return Err(DomainError::InvalidScenario("no scenarios in generated output".into()));
    }
    Ok(scenarios)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::rule::ScenarioCategory;
    use serde::Serialize;

    fn rule() -> BusinessRule {
        BusinessRule {
            rule_id: "R1".into(),
            rule_name: "customer_summary".into(),
            description: String::new(),
            source_tables: vec!["orders".into()],
            target_table: "customer_summary".into(),
            transformation_logic: String::new(),
            validation_query: "SELECT * FROM customer_summary WHERE note = 'a: \"b\"'".into(),
            expected_behavior: String::new(),
        }
    }

    #[derive(Serialize)]
    struct CatalogLine {
        id: String,
        category: ScenarioCategory,
        expected_record_count: Option<u64>,
        assertions: usize,
    }

    #[test]
    fn test_default_catalog() -> anyhow::Result<()> {
        let scenarios = ScenarioCatalog::new()?.default_scenarios(&rule())?;
        // awkward characters survive the YAML round trip
        assert_eq!(scenarios[0].validation_query.as_deref(), Some(rule().validation_query.as_str()));
        assert_eq!(
            scenarios[3].validation_query.as_deref(),
            Some("SELECT COUNT(*), COUNT(DISTINCT *) FROM customer_summary")
        );
        assert_eq!(
            scenarios[0].input_data_description.as_deref(),
            Some("Sample of records from orders")
        );

        let catalog: Vec<CatalogLine> = scenarios
            .iter()
            .map(|s| CatalogLine {
                id: s.id().to_string(),
                category: s.category,
                expected_record_count: s.expected_record_count,
                assertions: s.assertions.len(),
            })
            .collect();
        insta::assert_yaml_snapshot!("default_catalog", catalog);
        Ok(())
    }

    #[test]
    fn test_fenced_json_is_extracted_and_completed() -> anyhow::Result<()> {
        let text = "Here you go:\n```json\n[{\"name\": \"Totals add up\", \"category\": \"HAPPY_PATH\", \"assertions\": [\"no errors\"]},\n {\"scenario_id\": \"MINE\", \"name\": \"Other\", \"category\": \"WHATEVER\"}]\n```\nthanks";
        let scenarios = ScenarioCatalog::new()?.parse_generated(text, &rule())?;
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].id(), "TEST_R1_1");
        assert_eq!(scenarios[0].validation_query.as_deref(), Some(rule().validation_query.as_str()));
        assert_eq!(scenarios[1].id(), "MINE");
        assert_eq!(scenarios[1].category, ScenarioCategory::General);
        Ok(())
    }

    #[test]
    fn test_bare_json_array() {
        let parsed = parse_json_scenarios(r#"[{"name": "n"}]"#).unwrap();
        assert_eq!(parsed[0].name, "n");
    }

    #[test]
    fn test_garbage_falls_back_to_defaults() -> anyhow::Result<()> {
        let scenarios = ScenarioCatalog::new()?.parse_generated("I cannot help with that.", &rule())?;
        assert_eq!(scenarios.len(), 6);
        assert_eq!(scenarios[1].name, "Edge Case - Empty Dataset");
        Ok(())
    }
}
