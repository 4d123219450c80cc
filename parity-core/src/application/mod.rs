// parity-core/src/application/mod.rs

pub mod engine;
pub mod jobs;
pub mod pipeline;
pub mod validation;

pub use jobs::{JobManager, JobRecord, JobRegistry, JobSummary, SubmittedJob};
pub use pipeline::{ExecutionReport, RunMetrics, RunRequest, RunSummary, TransformationPipeline};
pub use validation::{TestResult, TestStatus, ValidationEngine, ValidationReport};
