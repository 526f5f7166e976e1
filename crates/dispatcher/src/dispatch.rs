use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gridx_core::GridError;

use crate::registry::WorkerRegistry;
use crate::transport::AgentTransport;

/// 一次派发的结果，失败也是正常返回值而不是错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Success {
        output: String,
        error: String,
        exit_code: i32,
        duration_ms: u64,
    },
    WorkerNotFound,
    /// 自动选择时目录里没有任何在线Worker
    NoEligibleWorker,
    ConnectionFailed {
        reason: String,
    },
    TimedOut {
        seconds: u64,
    },
    RemoteFailed {
        output: String,
        stderr: String,
        exit_code: i32,
    },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }
}

/// 带目标信息的派发结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    pub worker: Option<String>,
    pub auto_selected: bool,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// 批量派发汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: HashMap<String, DispatchOutcome>,
    pub success_count: usize,
    pub total: usize,
}

/// 远程执行派发器
pub struct ExecDispatcher {
    registry: Arc<WorkerRegistry>,
    transport: Arc<dyn AgentTransport>,
}

impl ExecDispatcher {
    pub fn new(registry: Arc<WorkerRegistry>, transport: Arc<dyn AgentTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// 在指定Worker上执行命令
    pub async fn dispatch(
        &self,
        worker_name: &str,
        command: &str,
        timeout: Option<Duration>,
    ) -> DispatchOutcome {
        let peer = match self.registry.find_peer(worker_name) {
            Some(peer) => peer,
            None => {
                warn!("派发目标不存在: {}", worker_name);
                return DispatchOutcome::WorkerNotFound;
            }
        };

        let start = Instant::now();
        match self.transport.exec(&peer.address, command, timeout).await {
            Ok(reply) if reply.exit_code == 0 => {
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    "Worker {} 执行完成，耗时 {}ms",
                    worker_name, duration_ms
                );
                DispatchOutcome::Success {
                    output: reply.output,
                    error: reply.error,
                    exit_code: reply.exit_code,
                    duration_ms,
                }
            }
            Ok(reply) => {
                debug!(
                    "Worker {} 命令退出码非零: {}",
                    worker_name, reply.exit_code
                );
                DispatchOutcome::RemoteFailed {
                    output: reply.output,
                    stderr: reply.error,
                    exit_code: reply.exit_code,
                }
            }
            Err(GridError::DispatchTimeout { seconds }) => {
                warn!("Worker {} 执行超时: {}秒", worker_name, seconds);
                DispatchOutcome::TimedOut { seconds }
            }
            Err(e) => {
                warn!("Worker {} 连接失败: {}", worker_name, e);
                DispatchOutcome::ConnectionFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// 自动选择最空闲的Worker并执行
    pub async fn dispatch_auto(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> DispatchReport {
        let best = match self.registry.select_best().await {
            Some(worker) => worker,
            None => {
                warn!("自动选择失败: 没有在线的Worker节点");
                return DispatchReport {
                    worker: None,
                    auto_selected: true,
                    outcome: DispatchOutcome::NoEligibleWorker,
                };
            }
        };

        info!("自动选择Worker: {}", best.name);
        let outcome = self.dispatch(&best.name, command, timeout).await;
        DispatchReport {
            worker: Some(best.name),
            auto_selected: true,
            outcome,
        }
    }

    /// 并发地在多个Worker上执行同一命令
    ///
    /// `["all"]` 展开为目录中的全部Worker。单个Worker失败
    /// 不影响其他Worker，结果按Worker名汇总。
    pub async fn batch_dispatch(
        &self,
        targets: &[String],
        command: &str,
        timeout: Option<Duration>,
    ) -> BatchReport {
        let names: Vec<String> = if targets == ["all"] {
            self.registry
                .peers()
                .iter()
                .map(|p| p.name.clone())
                .collect()
        } else {
            targets.to_vec()
        };

        let tasks = names.iter().map(|name| async {
            let outcome = self.dispatch(name, command, timeout).await;
            (name.clone(), outcome)
        });

        let results: HashMap<String, DispatchOutcome> =
            join_all(tasks).await.into_iter().collect();
        let success_count = results.values().filter(|o| o.is_success()).count();
        let total = names.len();

        info!(
            "批量执行完成: {}/{} 成功",
            success_count, total
        );

        BatchReport {
            results,
            success_count,
            total,
        }
    }
}
