pub mod manager;
pub mod monitor;
pub mod service;
pub mod stats;

pub use manager::JobManager;
pub use monitor::JobMonitor;
pub use service::{ExecuteRequest, ExecutionService, SubmitOutcome};
pub use stats::{JobStatsSnapshot, SystemProbe};
