pub mod analysis;
pub mod job;
pub mod worker;

pub use analysis::{AnalysisReport, AnalysisSummary, CodeIssue, IssueKind, Severity};
pub use job::{ExecutionJob, JobMetrics, JobPriority, JobStatus};
pub use worker::{OnlineWorker, WorkerPeer, WorkerResources, WorkerTelemetry};
