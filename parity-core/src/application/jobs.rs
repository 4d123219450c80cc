// parity-core/src/application/jobs.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::pipeline::{RunRequest, TransformationPipeline};
use crate::application::validation::ValidationEngine;
use crate::domain::error::DomainError;
use crate::domain::job::{JobKind, JobStatus};
use crate::domain::rule::{BusinessRule, TestScenario};
use crate::error::ParityError;
use crate::infrastructure::fs::{artifact_file_name, write_json_artifact};
use crate::ports::transform::Transform;

fn poisoned<T>(e: PoisonError<T>) -> ParityError {
    ParityError::InternalError(format!("job registry lock poisoned: {e}"))
}

/// One tracked background execution.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub rule_name: String,
    pub source_table: String,
    pub target_table: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: u64,
    pub pass_rate: Option<f64>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    #[serde(skip)]
    pub cancel: CancellationToken,
}

/// What a finished job reports back to the registry.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub records_processed: u64,
    pub pass_rate: Option<f64>,
    pub result: Option<serde_json::Value>,
}

/// Scalar view of a job, keyed by job id and rule name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub rule_name: String,
    pub records_processed: u64,
    pub duration_seconds: Option<f64>,
    pub pass_rate: Option<f64>,
    pub error: Option<String>,
}

impl From<&JobRecord> for JobSummary {
    fn from(job: &JobRecord) -> Self {
        let duration_seconds = job
            .started_at
            .zip(job.completed_at)
            .map(|(start, end)| (end - start).num_milliseconds() as f64 / 1000.0);
        Self {
            job_id: job.job_id,
            kind: job.kind,
            status: job.status,
            rule_name: job.rule_name.clone(),
            records_processed: job.records_processed,
            duration_seconds,
            pass_rate: job.pass_rate,
            error: job.error.clone(),
        }
    }
}

/// Concurrency-safe job table: a per-job lock under a registry-wide `RwLock`.
/// Every status change goes through a compare-and-swap on the job's lock.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Arc<Mutex<JobRecord>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        kind: JobKind,
        rule_name: impl Into<String>,
        source_table: impl Into<String>,
        target_table: impl Into<String>,
    ) -> Result<JobRecord, ParityError> {
        let record = JobRecord {
            job_id: Uuid::now_v7(),
            kind,
            status: JobStatus::Pending,
            rule_name: rule_name.into(),
            source_table: source_table.into(),
            target_table: target_table.into(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            records_processed: 0,
            pass_rate: None,
            error: None,
            result: None,
            cancel: CancellationToken::new(),
        };
        self.jobs
            .write()
            .map_err(poisoned)?
            .insert(record.job_id, Arc::new(Mutex::new(record.clone())));
        Ok(record)
    }

    fn entry(&self, id: Uuid) -> Result<Arc<Mutex<JobRecord>>, ParityError> {
        self.jobs
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::JobNotFound(id.to_string()).into())
    }

    pub fn get(&self, id: Uuid) -> Result<JobRecord, ParityError> {
        let job = self.entry(id)?;
        let record = job.lock().map_err(poisoned)?;
        Ok(record.clone())
    }

    fn transition<F>(
        &self,
        id: Uuid,
        expected: JobStatus,
        next: JobStatus,
        edit: F,
    ) -> Result<JobRecord, ParityError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let job = self.entry(id)?;
        let mut record = job.lock().map_err(poisoned)?;
        if record.status != expected || !expected.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                job_id: id.to_string(),
                from: record.status,
                to: next,
            }
            .into());
        }
        let now = Utc::now();
        record.status = next;
        if next == JobStatus::Running {
            record.started_at = Some(now);
        }
        if next.is_terminal() {
            record.completed_at = Some(now);
        }
        edit(&mut record);
        Ok(record.clone())
    }

    /// Moves the job from `expected` to `next`. Fails when the job is no
    /// longer in `expected` or the move is not a legal transition.
    pub fn compare_and_swap(
        &self,
        id: Uuid,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<JobRecord, ParityError> {
        self.transition(id, expected, next, |_| {})
    }

    pub fn start(&self, id: Uuid) -> Result<JobRecord, ParityError> {
        self.compare_and_swap(id, JobStatus::Pending, JobStatus::Running)
    }

    pub fn complete(&self, id: Uuid, outcome: JobOutcome) -> Result<JobRecord, ParityError> {
        self.transition(id, JobStatus::Running, JobStatus::Completed, |job| {
            job.records_processed = outcome.records_processed;
            job.pass_rate = outcome.pass_rate;
            job.result = outcome.result;
        })
    }

    pub fn fail(
        &self,
        id: Uuid,
        error: impl Into<String>,
        records_processed: u64,
    ) -> Result<JobRecord, ParityError> {
        let error = error.into();
        self.transition(id, JobStatus::Running, JobStatus::Failed, |job| {
            job.records_processed = records_processed;
            job.error = Some(error);
        })
    }

    /// Final state of a running job that observed its cancellation.
    pub fn mark_cancelled(&self, id: Uuid, records_processed: u64) -> Result<JobRecord, ParityError> {
        self.transition(id, JobStatus::Running, JobStatus::Cancelled, |job| {
            job.records_processed = records_processed;
            job.error = Some("cancelled".to_string());
        })
    }

    /// Pending jobs are cancelled on the spot. Running jobs get their token
    /// triggered and reach CANCELLED once the current batch or scenario ends.
    pub fn cancel(&self, id: Uuid) -> Result<JobRecord, ParityError> {
        let job = self.entry(id)?;
        let mut record = job.lock().map_err(poisoned)?;
        match record.status {
            JobStatus::Pending => {
                record.status = JobStatus::Cancelled;
                record.completed_at = Some(Utc::now());
                record.cancel.cancel();
            }
            JobStatus::Running => record.cancel.cancel(),
            from => {
                return Err(DomainError::IllegalTransition {
                    job_id: id.to_string(),
                    from,
                    to: JobStatus::Cancelled,
                }
                .into());
            }
        }
        Ok(record.clone())
    }

    /// Oldest first. v7 ids sort by creation time.
    pub fn list(&self) -> Result<Vec<JobRecord>, ParityError> {
        let jobs: Vec<Arc<Mutex<JobRecord>>> =
            self.jobs.read().map_err(poisoned)?.values().cloned().collect();
        let mut records = jobs
            .iter()
            .map(|job| job.lock().map(|r| r.clone()).map_err(poisoned))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.job_id);
        Ok(records)
    }

    /// Removes the job, cancelling it first if it is still live.
    pub fn delete(&self, id: Uuid) -> Result<JobRecord, ParityError> {
        let job = self
            .jobs
            .write()
            .map_err(poisoned)?
            .remove(&id)
            .ok_or_else(|| DomainError::JobNotFound(id.to_string()))?;
        let record = job.lock().map_err(poisoned)?;
        record.cancel.cancel();
        Ok(record.clone())
    }

    pub fn summaries(&self) -> Result<Vec<JobSummary>, ParityError> {
        Ok(self.list()?.iter().map(JobSummary::from).collect())
    }

    /// Writes every job summary to `dir/jobs_summary_<timestamp>.json`.
    pub fn export_summaries(&self, dir: &Path) -> Result<PathBuf, ParityError> {
        let file_name = artifact_file_name("jobs", "summary", Utc::now());
        Ok(write_json_artifact(dir, &file_name, &self.summaries()?)?)
    }
}

/// A spawned job. Awaiting it is optional; the registry tracks the outcome.
pub struct SubmittedJob {
    pub job_id: Uuid,
    handle: JoinHandle<()>,
}

impl SubmittedJob {
    pub async fn join(self) -> Result<Uuid, ParityError> {
        self.handle
            .await
            .map_err(|e| ParityError::InternalError(format!("job task panicked: {e}")))?;
        Ok(self.job_id)
    }
}

fn records_of(err: &ParityError) -> u64 {
    match err {
        ParityError::RunFailed {
            records_processed, ..
        } => *records_processed,
        _ => 0,
    }
}

/// Dispatches pipeline, validation and workflow runs onto tokio tasks and
/// keeps their records in a [`JobRegistry`].
#[derive(Clone)]
pub struct JobManager {
    registry: Arc<JobRegistry>,
    pipeline: Arc<TransformationPipeline>,
    validation: Arc<ValidationEngine>,
}

impl JobManager {
    pub fn new(pipeline: Arc<TransformationPipeline>, validation: Arc<ValidationEngine>) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            pipeline,
            validation,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    fn finish(&self, id: Uuid, result: Result<JobOutcome, ParityError>, cancel: &CancellationToken) {
        let update = match result {
            Ok(outcome) if cancel.is_cancelled() => {
                self.registry.mark_cancelled(id, outcome.records_processed)
            }
            Ok(outcome) => self.registry.complete(id, outcome),
            Err(e) if e.is_cancelled() => self.registry.mark_cancelled(id, records_of(&e)),
            Err(e) => self.registry.fail(id, e.to_string(), records_of(&e)),
        };
        match update {
            Ok(job) => info!(job_id = %id, status = %job.status, "Job finished"),
            Err(e) => warn!(job_id = %id, "Could not record job outcome: {}", e),
        }
    }

    fn started(&self, id: Uuid) -> bool {
        match self.registry.start(id) {
            Ok(_) => true,
            Err(e) => {
                // cancelled while still pending
                warn!(job_id = %id, "Job not started: {}", e);
                false
            }
        }
    }

    #[instrument(skip_all, fields(rule = %rule_name))]
    pub fn submit_pipeline(
        &self,
        rule_name: &str,
        request: RunRequest,
        transform: Arc<dyn Transform>,
    ) -> Result<SubmittedJob, ParityError> {
        let job = self.registry.register(
            JobKind::Pipeline,
            rule_name,
            &request.source_table,
            &request.target_table,
        )?;
        let (job_id, cancel) = (job.job_id, job.cancel);
        let this = self.clone();
        let handle = tokio::spawn(async move {
            if !this.started(job_id) {
                return;
            }
            let result = this
                .pipeline
                .run(&request, transform.as_ref(), &cancel)
                .await
                .map(|summary| JobOutcome {
                    records_processed: summary.records_processed,
                    pass_rate: None,
                    result: serde_json::to_value(&summary).ok(),
                });
            this.finish(job_id, result, &cancel);
        });
        info!(%job_id, "🧵 Pipeline job submitted");
        Ok(SubmittedJob { job_id, handle })
    }

    #[instrument(skip_all, fields(rule = %rule.rule_name))]
    pub fn submit_validation(
        &self,
        rule: BusinessRule,
        scenarios: Vec<TestScenario>,
    ) -> Result<SubmittedJob, ParityError> {
        let job = self.registry.register(
            JobKind::Validation,
            &rule.rule_name,
            rule.primary_source()?,
            &rule.target_table,
        )?;
        let (job_id, cancel) = (job.job_id, job.cancel);
        let this = self.clone();
        let handle = tokio::spawn(async move {
            if !this.started(job_id) {
                return;
            }
            let report = this.validation.validate(&rule, &scenarios, &cancel).await;
            let outcome = JobOutcome {
                records_processed: 0,
                pass_rate: Some(report.pass_rate()),
                result: serde_json::to_value(&report).ok(),
            };
            this.finish(job_id, Ok(outcome), &cancel);
        });
        info!(%job_id, "🧵 Validation job submitted");
        Ok(SubmittedJob { job_id, handle })
    }

    /// Pipeline then validation. A failed pipeline skips validation.
    #[instrument(skip_all, fields(rule = %rule.rule_name))]
    pub fn submit_workflow(
        &self,
        rule: BusinessRule,
        request: RunRequest,
        transform: Arc<dyn Transform>,
        scenarios: Vec<TestScenario>,
    ) -> Result<SubmittedJob, ParityError> {
        let job = self.registry.register(
            JobKind::Workflow,
            &rule.rule_name,
            &request.source_table,
            &request.target_table,
        )?;
        let (job_id, cancel) = (job.job_id, job.cancel);
        let this = self.clone();
        let handle = tokio::spawn(async move {
            if !this.started(job_id) {
                return;
            }
            let result = match this.pipeline.run(&request, transform.as_ref(), &cancel).await {
                Ok(run) => {
                    let report = this.validation.validate(&rule, &scenarios, &cancel).await;
                    Ok(JobOutcome {
                        records_processed: run.records_processed,
                        pass_rate: Some(report.pass_rate()),
                        result: Some(serde_json::json!({
                            "run": run,
                            "validation": report,
                        })),
                    })
                }
                Err(e) => Err(e),
            };
            this.finish(job_id, result, &cancel);
        });
        info!(%job_id, "🧵 Workflow job submitted");
        Ok(SubmittedJob { job_id, handle })
    }
}
