use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use gridx_analyzer::CodeAnalyzer;
use gridx_core::{GridError, GridResult};
use gridx_dispatcher::{DispatchOutcome, ExecDispatcher};
use gridx_domain::{AnalysisReport, JobPriority};

use crate::manager::JobManager;

/// 受检执行请求
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    #[serde(default)]
    pub worker: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub priority: Option<JobPriority>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// 明知有风险仍要执行（跳过准入拦截，分析结果照常记录）
    #[serde(default)]
    pub allow_risky: bool,
}

/// 受检执行的受理结论
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// 静态分析拦截，附完整报告供调用方整改
    Rejected { analysis: AnalysisReport },
    Accepted { job_id: Uuid },
}

/// 准入分析 + 任务池 + 远程派发的组合服务
pub struct ExecutionService {
    analyzer: Arc<dyn CodeAnalyzer>,
    manager: Arc<JobManager>,
    dispatcher: Arc<ExecDispatcher>,
    default_timeout_seconds: u64,
}

impl ExecutionService {
    pub fn new(
        analyzer: Arc<dyn CodeAnalyzer>,
        manager: Arc<JobManager>,
        dispatcher: Arc<ExecDispatcher>,
        default_timeout_seconds: u64,
    ) -> Self {
        Self {
            analyzer,
            manager,
            dispatcher,
            default_timeout_seconds,
        }
    }

    pub fn analyzer(&self) -> &Arc<dyn CodeAnalyzer> {
        &self.analyzer
    }

    /// 分析代码但不执行
    pub fn analyze(&self, code: &str) -> AnalysisReport {
        self.analyzer.analyze(code)
    }

    /// 受检执行：先准入分析，放行才入池
    ///
    /// 拒绝不是错误，报告原样返回。Worker解析失败走任务
    /// 的正常失败路径，不会让本调用报错。
    pub async fn safe_execute(&self, request: ExecuteRequest) -> GridResult<SubmitOutcome> {
        let report = self.analyzer.analyze(&request.code);

        if !report.should_execute && !request.allow_risky {
            info!(
                "代码准入拦截: {}个高危问题",
                report.high_severity_count()
            );
            return Ok(SubmitOutcome::Rejected { analysis: report });
        }
        if !report.should_execute {
            warn!("调用方选择跳过准入拦截，任务将继续执行");
        }

        let timeout = request
            .timeout_seconds
            .unwrap_or(self.default_timeout_seconds);
        let job_id = self
            .manager
            .create_job(
                request.code,
                request.worker,
                request.user_id,
                request.priority.unwrap_or_default(),
                Some(timeout),
                Some(report),
            )
            .await;

        let dispatcher = Arc::clone(&self.dispatcher);
        let manager = Arc::clone(&self.manager);

        let submitted = self
            .manager
            .submit_job(job_id, move |job| async move {
                let command = python_command(&job.code);
                let timeout = job.timeout_seconds.map(Duration::from_secs);

                let (worker, outcome) = match job.worker.clone() {
                    Some(name) => {
                        let outcome = dispatcher.dispatch(&name, &command, timeout).await;
                        (name, outcome)
                    }
                    None => {
                        let report = dispatcher.dispatch_auto(&command, timeout).await;
                        match report.worker {
                            Some(name) => {
                                manager.assign_worker(job.id, &name).await;
                                (name, report.outcome)
                            }
                            None => return Err(GridError::NoEligibleWorker),
                        }
                    }
                };

                match outcome {
                    DispatchOutcome::Success {
                        output,
                        error,
                        exit_code,
                        duration_ms,
                    } => Ok(json!({
                        "worker": worker,
                        "output": output,
                        "error": error,
                        "exit_code": exit_code,
                        "duration_ms": duration_ms,
                    })),
                    DispatchOutcome::WorkerNotFound => {
                        Err(GridError::worker_not_found(worker))
                    }
                    DispatchOutcome::NoEligibleWorker => Err(GridError::NoEligibleWorker),
                    DispatchOutcome::ConnectionFailed { reason } => {
                        Err(GridError::connection(reason))
                    }
                    DispatchOutcome::TimedOut { seconds } => {
                        Err(GridError::DispatchTimeout { seconds })
                    }
                    DispatchOutcome::RemoteFailed { stderr, exit_code, .. } => {
                        Err(GridError::RemoteExit {
                            code: exit_code,
                            stderr,
                        })
                    }
                }
            })
            .await?;

        if !submitted {
            // create_job刚插入的任务必然是Pending，除非并发清理
            return Err(GridError::internal("任务提交失败"));
        }

        Ok(SubmitOutcome::Accepted { job_id })
    }
}

/// 把Python源码包装成代理可执行的shell命令
fn python_command(code: &str) -> String {
    let escaped = code.replace('\'', "'\\''");
    format!("python3 -c '{escaped}'")
}
