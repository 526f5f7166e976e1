use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analysis::AnalysisReport;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Analyzing,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl JobStatus {
    /// 终止状态一旦写入便不再变化
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Timeout
        )
    }
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Analyzing | JobStatus::Running
        )
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub execution_time_ms: u64,
    pub output_bytes: usize,
}

/// 一次远程代码执行任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionJob {
    pub id: Uuid,
    pub code: String,
    /// 实际执行的Worker，派发时才确定
    pub worker: Option<String>,
    pub user_id: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub timeout_seconds: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub analysis: Option<AnalysisReport>,
    pub metrics: JobMetrics,
    /// 估算进度，范围[0,1]，仅供展示
    pub progress: f64,
    #[serde(skip, default)]
    pub cancel_token: CancellationToken,
}

impl ExecutionJob {
    pub fn new(code: String, worker: Option<String>, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            worker,
            user_id: user_id.unwrap_or_else(|| "anonymous".to_string()),
            status: JobStatus::Pending,
            priority: JobPriority::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            timeout_seconds: None,
            result: None,
            error: None,
            analysis: None,
            metrics: JobMetrics::default(),
            progress: 0.0,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 进入执行态，仅允许从Pending/Analyzing转入
    pub fn mark_running(&mut self) -> bool {
        if !matches!(self.status, JobStatus::Pending | JobStatus::Analyzing) {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// 正常完成，终止态任务的写入被拒绝
    pub fn finish(&mut self, result: serde_json::Value) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.progress = 1.0;
        self.complete_now();
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.complete_now();
        true
    }

    /// 取消或超时等外部强制终止
    pub fn force_terminal(&mut self, status: JobStatus, error: Option<String>) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.cancel_token.cancel();
        self.status = status;
        if let Some(msg) = error {
            self.error = Some(msg);
        }
        self.complete_now();
        true
    }

    fn complete_now(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            self.metrics.execution_time_ms = (now - started).num_milliseconds().max(0) as u64;
        }
    }

    /// 执行耗时（秒），未开始为0
    pub fn elapsed_seconds(&self) -> f64 {
        match self.started_at {
            Some(started) => {
                let end = self.completed_at.unwrap_or_else(Utc::now);
                ((end - started).num_milliseconds().max(0) as f64) / 1000.0
            }
            None => 0.0,
        }
    }

    /// 监控线程据此刷新展示进度，有超时的任务最多报90%，
    /// 没有超时的按5分钟基准最多报50%
    pub fn advisory_progress(&self) -> f64 {
        if self.is_terminal() {
            return self.progress;
        }
        let elapsed = self.elapsed_seconds();
        match self.timeout_seconds {
            Some(timeout) if timeout > 0 => (elapsed / timeout as f64 * 0.8).min(0.9),
            _ => (elapsed / 300.0).min(0.5),
        }
    }

    /// 有超时设置且已超出
    pub fn is_overdue(&self) -> bool {
        match (self.status, self.timeout_seconds, self.started_at) {
            (JobStatus::Running, Some(timeout), Some(_)) => {
                self.elapsed_seconds() > timeout as f64
            }
            _ => false,
        }
    }
}
