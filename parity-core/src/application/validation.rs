// parity-core/src/application/validation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::domain::data::Table;
use crate::domain::rule::{BusinessRule, ScenarioCategory, TestScenario};
use crate::domain::validation::{
    AssertionContext, AssertionTable, Discrepancy, DiscrepancyDetector, StatisticalSummary,
    ValidationThresholds,
};
use crate::error::ParityError;
use crate::infrastructure::fs::{artifact_file_name, write_json_artifact};
use crate::ports::store::DataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Error,
    /// Accepted on input for compatibility with external reports; the
    /// engine itself only emits the three other states.
    Warning,
}

/// Evidence attached to each result: what was looked at and a fingerprint of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofOfExecution {
    pub timestamp: DateTime<Utc>,
    pub source_sample: Vec<serde_json::Map<String, serde_json::Value>>,
    pub target_sample: Vec<serde_json::Map<String, serde_json::Value>>,
    pub source_checksum: String,
    pub target_checksum: String,
    pub source_count: usize,
    pub target_count: usize,
    pub scenario_details: TestScenario,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// SHA-256 of the sample's JSON records, `"N/A"` for an empty sample.
fn sample_checksum(sample: &Table) -> String {
    if sample.is_empty() {
        return "N/A".to_string();
    }
    let json = serde_json::to_string(&sample.to_records()).unwrap_or_default();
    format!("{:x}", Sha256::digest(json.as_bytes()))
}

impl ProofOfExecution {
    fn collect(source: &Table, target: &Table, scenario: &TestScenario, rows: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            source_sample: source.head(rows).to_records(),
            target_sample: target.head(rows).to_records(),
            source_checksum: sample_checksum(source),
            target_checksum: sample_checksum(target),
            source_count: source.len(),
            target_count: target.len(),
            scenario_details: scenario.clone(),
            error: None,
        }
    }

    fn failed(scenario: &TestScenario, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            source_sample: Vec::new(),
            target_sample: Vec::new(),
            source_checksum: "N/A".to_string(),
            target_checksum: "N/A".to_string(),
            source_count: 0,
            target_count: 0,
            scenario_details: scenario.clone(),
            error: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub scenario_id: String,
    pub scenario_name: String,
    pub category: ScenarioCategory,
    pub status: TestStatus,
    pub execution_time_seconds: f64,
    pub records_tested: u64,
    pub records_expected: u64,
    pub discrepancies: Vec<Discrepancy>,
    pub proof_of_execution: ProofOfExecution,
    pub statistical_summary: StatisticalSummary,
    pub assertions_checked: Vec<String>,
    pub assertions_passed: Vec<String>,
    pub assertions_failed: Vec<String>,
}

impl TestResult {
    /// Contained failure: zero counts, one EXECUTION_ERROR, every assertion failed.
    fn error(scenario: &TestScenario, message: &str, elapsed: f64) -> Self {
        Self {
            scenario_id: scenario.id().to_string(),
            scenario_name: scenario.name.clone(),
            category: scenario.category,
            status: TestStatus::Error,
            execution_time_seconds: elapsed,
            records_tested: 0,
            records_expected: 0,
            discrepancies: vec![Discrepancy::execution_error(message)],
            proof_of_execution: ProofOfExecution::failed(scenario, message),
            statistical_summary: StatisticalSummary::NotAvailable,
            assertions_checked: scenario.assertions.clone(),
            assertions_passed: Vec::new(),
            assertions_failed: scenario.assertions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rule_id: String,
    pub rule_name: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<TestResult>,
}

impl ValidationReport {
    fn new(rule: &BusinessRule, started_at: DateTime<Utc>, duration: f64, results: Vec<TestResult>) -> Self {
        let count = |s: TestStatus| results.iter().filter(|r| r.status == s).count();
        Self {
            rule_id: rule.rule_id.clone(),
            rule_name: rule.rule_name.clone(),
            started_at,
            duration_seconds: duration,
            total: results.len(),
            passed: count(TestStatus::Pass),
            failed: count(TestStatus::Fail),
            errors: count(TestStatus::Error),
            warnings: count(TestStatus::Warning),
            results,
        }
    }

    /// Percentage of passing scenarios, 0 when there are none.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 * 100.0 / self.total as f64
    }

    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }

    /// Writes `validation_<rule>_<timestamp>.json` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ParityError> {
        let file_name = artifact_file_name("validation", &self.rule_name, self.started_at);
        Ok(write_json_artifact(dir, &file_name, self)?)
    }
}

/// Statistical comparison of a rule's source and target, one
/// [`TestResult`] per scenario.
pub struct ValidationEngine {
    source: Arc<dyn DataStore>,
    target: Arc<dyn DataStore>,
    thresholds: ValidationThresholds,
    assertions: AssertionTable,
}

impl ValidationEngine {
    pub fn new(source: Arc<dyn DataStore>, target: Arc<dyn DataStore>) -> Self {
        Self {
            source,
            target,
            thresholds: ValidationThresholds::default(),
            assertions: AssertionTable::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ValidationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_assertions(mut self, assertions: AssertionTable) -> Self {
        self.assertions = assertions;
        self
    }

    /// Runs every scenario independently. The report always holds one
    /// result per scenario, in input order.
    #[instrument(skip_all, fields(rule = %rule.rule_name, scenarios = scenarios.len()))]
    pub async fn validate(
        &self,
        rule: &BusinessRule,
        scenarios: &[TestScenario],
        cancel: &CancellationToken,
    ) -> ValidationReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!("🔍 Validating rule '{}'", rule.rule_name);

        let mut results = Vec::with_capacity(scenarios.len());
        for (index, scenario) in scenarios.iter().enumerate() {
            let scenario = scenario.clone().complete(rule, index);
            if cancel.is_cancelled() {
                results.push(TestResult::error(&scenario, "validation cancelled", 0.0));
                continue;
            }
            results.push(self.run_scenario(rule, &scenario).await);
        }

        let report = ValidationReport::new(rule, started_at, clock.elapsed().as_secs_f64(), results);
        info!(
            passed = report.passed,
            failed = report.failed,
            errors = report.errors,
            "✅ Validation finished: {:.1}% pass rate",
            report.pass_rate()
        );
        report
    }

    async fn run_scenario(&self, rule: &BusinessRule, scenario: &TestScenario) -> TestResult {
        let clock = Instant::now();
        match self.evaluate(rule, scenario, &clock).await {
            Ok(result) => {
                if result.status != TestStatus::Pass {
                    warn!(
                        scenario = %result.scenario_id,
                        discrepancies = result.discrepancies.len(),
                        failed_assertions = result.assertions_failed.len(),
                        "Scenario failed"
                    );
                }
                result
            }
            Err(e) => {
                let message = e.to_string();
                error!(scenario = %scenario.id(), "❌ Scenario errored: {}", message);
                TestResult::error(scenario, &message, clock.elapsed().as_secs_f64())
            }
        }
    }

    async fn evaluate(
        &self,
        rule: &BusinessRule,
        scenario: &TestScenario,
        clock: &Instant,
    ) -> Result<TestResult, ParityError> {
        let limit = self.thresholds.sample_limit;
        let source = self.source.sample(rule.primary_source()?, limit).await?;
        let target = self.target.sample(&rule.target_table, limit).await?;

        let discrepancies = DiscrepancyDetector::new(&self.thresholds).detect(&source, &target, scenario);
        let ctx = AssertionContext {
            source: &source,
            target: &target,
        };
        let (passed, failed) = self.assertions.evaluate(&scenario.assertions, &ctx);
        let summary = StatisticalSummary::of(&target);

        let status = if discrepancies.is_empty() && failed.is_empty() {
            TestStatus::Pass
        } else {
            TestStatus::Fail
        };

        Ok(TestResult {
            scenario_id: scenario.id().to_string(),
            scenario_name: scenario.name.clone(),
            category: scenario.category,
            status,
            execution_time_seconds: clock.elapsed().as_secs_f64(),
            records_tested: target.len() as u64,
            records_expected: scenario
                .expected_record_count
                .unwrap_or(source.len() as u64),
            discrepancies,
            proof_of_execution: ProofOfExecution::collect(
                &source,
                &target,
                scenario,
                self.thresholds.proof_sample_rows,
            ),
            statistical_summary: summary,
            assertions_checked: scenario.assertions.clone(),
            assertions_passed: passed,
            assertions_failed: failed,
        })
    }
}
