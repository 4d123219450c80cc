// parity-core/src/application/pipeline.rs

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::data::Table;
use crate::domain::error::DomainError;
use crate::domain::project::{ExecutionMode, PipelineSettings};
use crate::error::{ParityError, RunStage};
use crate::ports::store::{BatchRequest, DataStore, Filters, KeyRange};
use crate::ports::transform::Transform;

/// Counters of one run. A fresh instance is created for every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_records_processed: u64,
    pub successful_batches: u64,
    pub failed_batches: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub source_table: String,
    pub target_table: String,
    pub status: RunStatus,
    pub metrics: RunMetrics,
    pub duration_seconds: f64,
    pub snapshot_name: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub current_metrics: RunMetrics,
    pub execution_history: Vec<ExecutionLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub source_table: String,
    pub target_table: String,
    pub mode: ExecutionMode,
    pub records_processed: u64,
    pub batches: u64,
    pub duration_seconds: f64,
    pub throughput_rows_per_sec: f64,
    pub snapshot_name: Option<String>,
}

/// Everything one run needs besides the transform.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub source_table: String,
    pub target_table: String,
    pub settings: PipelineSettings,
    pub filters: Filters,
}

impl RunRequest {
    pub fn new(source_table: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            settings: PipelineSettings::default(),
            filters: Filters::new(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }
}

/// `{target}_snapshot_{YYYYMMDD_HHMMSS_mmm}`, UTC.
pub fn snapshot_name(target_table: &str, at: DateTime<Utc>) -> String {
    format!("{}_snapshot_{}", target_table, at.format("%Y%m%d_%H%M%S_%3f"))
}

/// Splits `[lo, hi]` into at most `n` contiguous, non-overlapping ranges.
pub fn partition_ranges(lo: i64, hi: i64, n: usize) -> Vec<(i64, i64)> {
    if hi < lo {
        return Vec::new();
    }
    let span = i128::from(hi) - i128::from(lo) + 1;
    let parts = (n.max(1) as i128).min(span);
    let size = (span + parts - 1) / parts;

    let mut ranges = Vec::with_capacity(parts as usize);
    let mut start = i128::from(lo);
    while start <= i128::from(hi) {
        let end = (start + size - 1).min(i128::from(hi));
        // both ends lie within [lo, hi], so they fit back into i64
        ranges.push((start as i64, end as i64));
        start = end + 1;
    }
    ranges
}

type StageError = (RunStage, ParityError);

/// Post-transform check applied to every batch in sequential mode.
fn validate_output(input_rows: usize, output: &Table) -> Result<(), DomainError> {
    if output.is_empty() {
        return Err(DomainError::EmptyTransformOutput { input_rows });
    }
    let all_null = output.all_null_columns();
    if !all_null.is_empty() {
        warn!(columns = ?all_null, "⚠️  Transformed batch has columns that are entirely NULL");
    }
    Ok(())
}

/// Extract -> transform -> load between two stores, with an optional
/// snapshot of the target taken first.
pub struct TransformationPipeline {
    source: Arc<dyn DataStore>,
    target: Arc<dyn DataStore>,
    last_metrics: Mutex<RunMetrics>,
    history: Mutex<Vec<ExecutionLogEntry>>,
}

impl TransformationPipeline {
    pub fn new(source: Arc<dyn DataStore>, target: Arc<dyn DataStore>) -> Self {
        Self {
            source,
            target,
            last_metrics: Mutex::new(RunMetrics::default()),
            history: Mutex::new(Vec::new()),
        }
    }

    #[instrument(skip(self, request, transform, cancel), fields(
        source = %request.source_table,
        target = %request.target_table,
        mode = %request.settings.mode,
    ))]
    pub async fn run(
        &self,
        request: &RunRequest,
        transform: &dyn Transform,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ParityError> {
        let clock = Instant::now();
        let mut metrics = RunMetrics {
            start_time: Some(Utc::now()),
            ..RunMetrics::default()
        };
        info!("🚀 Starting {} run ({})", request.settings.mode, transform.name());

        let snapshot = if request.settings.enable_rollback {
            self.take_snapshot(&request.target_table).await
        } else {
            None
        };

        let result = match request.settings.mode {
            ExecutionMode::Sequential => {
                self.run_sequential(request, transform, cancel, &mut metrics)
                    .await
            }
            ExecutionMode::Partitioned => {
                self.run_partitioned(request, transform, cancel, &mut metrics)
                    .await
            }
        };

        metrics.end_time = Some(Utc::now());
        let duration = clock.elapsed().as_secs_f64();
        let status = match &result {
            Ok(()) => RunStatus::Success,
            Err(e) if e.is_cancelled() => RunStatus::Cancelled,
            Err(_) => RunStatus::Failed,
        };

        self.append_log(ExecutionLogEntry {
            timestamp: Utc::now(),
            source_table: request.source_table.clone(),
            target_table: request.target_table.clone(),
            status,
            metrics: metrics.clone(),
            duration_seconds: duration,
            snapshot_name: snapshot.clone(),
            error: result.as_ref().err().map(ToString::to_string),
        });
        if let Ok(mut last) = self.last_metrics.lock() {
            *last = metrics.clone();
        }

        if let Err(e) = result {
            warn!(status = ?status, "❌ Run stopped: {}", e);
            return Err(e);
        }

        let throughput = if duration > 0.0 {
            metrics.total_records_processed as f64 / duration
        } else {
            0.0
        };
        info!(
            records = metrics.total_records_processed,
            batches = metrics.successful_batches,
            "✅ Run completed in {:.2}s ({:.0} rows/s)",
            duration,
            throughput
        );
        Ok(RunSummary {
            source_table: request.source_table.clone(),
            target_table: request.target_table.clone(),
            mode: request.settings.mode,
            records_processed: metrics.total_records_processed,
            batches: metrics.successful_batches,
            duration_seconds: duration,
            throughput_rows_per_sec: throughput,
            snapshot_name: snapshot,
        })
    }

    /// Snapshot failures never abort the run: data motion proceeds without a rollback point.
    async fn take_snapshot(&self, target_table: &str) -> Option<String> {
        match self.target.table_exists(target_table).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Target does not exist yet, nothing to snapshot");
                return None;
            }
            Err(e) => {
                warn!("⚠️  Could not create snapshot: {}", e);
                return None;
            }
        }
        let name = snapshot_name(target_table, Utc::now());
        match self.target.create_snapshot(target_table, &name).await {
            Ok(()) => {
                info!(snapshot = %name, "Created rollback snapshot");
                Some(name)
            }
            Err(e) => {
                warn!("⚠️  Could not create snapshot: {}", e);
                None
            }
        }
    }

    async fn run_sequential(
        &self,
        request: &RunRequest,
        transform: &dyn Transform,
        cancel: &CancellationToken,
        metrics: &mut RunMetrics,
    ) -> Result<(), ParityError> {
        let settings = &request.settings;
        let mut batches = self.source.stream_batches(
            BatchRequest::new(&request.source_table, settings.batch_size)
                .with_filters(request.filters.clone()),
        );

        let mut batch_no = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(ParityError::from(DomainError::Cancelled)
                    .at_stage(RunStage::Cancel, metrics.total_records_processed));
            }
            let Some(page) = batches.next().await else {
                break;
            };
            batch_no += 1;

            let outcome = match page {
                Ok(batch) => self.process_batch(batch, request, transform).await,
                Err(e) => Err((RunStage::Extract, e)),
            };
            match outcome {
                Ok(loaded) => {
                    metrics.successful_batches += 1;
                    metrics.total_records_processed += loaded;
                    debug!(batch = batch_no, loaded, total = metrics.total_records_processed, "Batch loaded");
                }
                Err((stage, e)) => {
                    metrics.failed_batches += 1;
                    return Err(e.at_stage(stage, metrics.total_records_processed));
                }
            }
        }
        Ok(())
    }

    async fn process_batch(
        &self,
        batch: Table,
        request: &RunRequest,
        transform: &dyn Transform,
    ) -> Result<u64, StageError> {
        let input_rows = batch.len();
        let output = transform
            .apply(batch)
            .map_err(|e| (RunStage::Transform, ParityError::from(DomainError::from(e))))?;
        validate_output(input_rows, &output).map_err(|e| (RunStage::Validate, ParityError::from(e)))?;
        self.target
            .bulk_load(&request.target_table, &output, request.settings.load_chunk_size)
            .await
            .map_err(|e| (RunStage::Load, e))
    }

    /// One worker per key range plus one for NULL keys, at most
    /// `max_workers` at a time. No per-batch validation; a failing partition
    /// does not stop the others. While the target does not exist, partitions
    /// load one at a time until one of them has created it.
    async fn run_partitioned(
        &self,
        request: &RunRequest,
        transform: &dyn Transform,
        cancel: &CancellationToken,
        metrics: &mut RunMetrics,
    ) -> Result<(), ParityError> {
        let settings = &request.settings;
        if !request.filters.is_empty() {
            warn!("Filters are ignored in partitioned mode");
        }
        let bounds = self
            .source
            .column_bounds(&request.source_table, &settings.partition_column)
            .await
            .map_err(|e| e.at_stage(RunStage::Partition, 0))?;
        let mut ranges: Vec<KeyRange> = match bounds {
            Some((lo, hi)) => {
                info!("🔀 Partitioning {}..={}", lo, hi);
                partition_ranges(lo, hi, settings.partitions)
                    .into_iter()
                    .map(|(lower, upper)| KeyRange::Between(lower, upper))
                    .collect()
            }
            None => {
                info!("Partition column has no values, only NULL keys remain");
                Vec::new()
            }
        };
        ranges.push(KeyRange::Null);
        info!(partitions = ranges.len(), workers = settings.max_workers, "🔀 Partitioned run");

        let target_exists = self
            .target
            .table_exists(&request.target_table)
            .await
            .map_err(|e| e.at_stage(RunStage::Partition, 0))?;

        let mut pending = ranges.into_iter();
        let mut outcomes: Vec<Result<Option<u64>, StageError>> = Vec::new();
        if !target_exists {
            // concurrent first loads would race to create the table
            for range in pending.by_ref() {
                let outcome = self.process_partition(request, transform, cancel, range).await;
                let created = matches!(outcome, Ok(Some(loaded)) if loaded > 0);
                outcomes.push(outcome);
                if created {
                    break;
                }
            }
        }
        let parallel: Vec<Result<Option<u64>, StageError>> = stream::iter(pending)
            .map(|range| self.process_partition(request, transform, cancel, range))
            .buffer_unordered(settings.max_workers.max(1))
            .collect()
            .await;
        outcomes.extend(parallel);

        let mut first_failure: Option<StageError> = None;
        for outcome in outcomes {
            match outcome {
                Ok(None) => {}
                Ok(Some(loaded)) => {
                    metrics.successful_batches += 1;
                    metrics.total_records_processed += loaded;
                }
                Err((stage, e)) => {
                    metrics.failed_batches += 1;
                    warn!(%stage, "Partition failed: {}", e);
                    // a real failure outranks a cancellation
                    let replace = match &first_failure {
                        None => true,
                        Some((_, prev)) => prev.is_cancelled() && !e.is_cancelled(),
                    };
                    if replace {
                        first_failure = Some((stage, e));
                    }
                }
            }
        }

        match first_failure {
            Some((stage, e)) => Err(e.at_stage(stage, metrics.total_records_processed)),
            None => Ok(()),
        }
    }

    async fn process_partition(
        &self,
        request: &RunRequest,
        transform: &dyn Transform,
        cancel: &CancellationToken,
        range: KeyRange,
    ) -> Result<Option<u64>, StageError> {
        if cancel.is_cancelled() {
            return Err((RunStage::Cancel, ParityError::from(DomainError::Cancelled)));
        }
        let settings = &request.settings;
        let part = self
            .source
            .fetch_partition(&request.source_table, &settings.partition_column, range)
            .await
            .map_err(|e| (RunStage::Extract, e))?;
        if part.is_empty() {
            // not a batch
            return Ok(None);
        }
        let output = transform
            .apply(part)
            .map_err(|e| (RunStage::Transform, ParityError::from(DomainError::from(e))))?;
        let loaded = self
            .target
            .bulk_load(&request.target_table, &output, settings.load_chunk_size)
            .await
            .map_err(|e| (RunStage::Load, e))?;
        debug!(?range, loaded, "Partition loaded");
        Ok(Some(loaded))
    }

    fn append_log(&self, entry: ExecutionLogEntry) {
        if let Ok(mut history) = self.history.lock() {
            history.push(entry);
        }
    }

    pub fn get_execution_report(&self) -> ExecutionReport {
        ExecutionReport {
            current_metrics: self
                .last_metrics
                .lock()
                .map(|m| m.clone())
                .unwrap_or_default(),
            execution_history: self
                .history
                .lock()
                .map(|h| h.clone())
                .unwrap_or_default(),
        }
    }

    /// Restores the target of the most recent run that took a snapshot.
    /// Returns the snapshot used, `None` when no run has one.
    pub async fn rollback_last_run(&self) -> Result<Option<String>, ParityError> {
        let last = self.history.lock().ok().and_then(|h| {
            h.iter()
                .rev()
                .find_map(|e| e.snapshot_name.clone().map(|s| (e.target_table.clone(), s)))
        });
        let Some((target_table, snapshot)) = last else {
            warn!("No snapshot recorded, nothing to roll back");
            return Ok(None);
        };
        self.target.rollback(&target_table, &snapshot).await?;
        info!(target = %target_table, snapshot = %snapshot, "⏪ Rolled back last run");
        Ok(Some(snapshot))
    }
}
