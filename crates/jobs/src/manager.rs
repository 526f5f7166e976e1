use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use gridx_core::{GridError, GridResult};
use gridx_domain::{AnalysisReport, ExecutionJob, JobPriority, JobStatus};

use crate::stats::{JobStatsSnapshot, SystemProbe};

/// 任务表与执行池
///
/// 每个任务独占一把锁，互不相干的任务不会互相阻塞。
/// 并发度由信号量限制，超出容量的任务排队等待执行槽。
pub struct JobManager {
    jobs: RwLock<HashMap<Uuid, Arc<RwLock<ExecutionJob>>>>,
    pool: Arc<Semaphore>,
    probe: SystemProbe,
}

impl JobManager {
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            pool: Arc::new(Semaphore::new(max_concurrent_jobs)),
            probe: SystemProbe::new(),
        }
    }

    /// 登记一个新任务，立即返回，不做分析也不排程
    pub async fn create_job(
        &self,
        code: String,
        worker: Option<String>,
        user_id: Option<String>,
        priority: JobPriority,
        timeout_seconds: Option<u64>,
        analysis: Option<AnalysisReport>,
    ) -> Uuid {
        let mut job = ExecutionJob::new(code, worker, user_id).with_priority(priority);
        if let Some(timeout) = timeout_seconds {
            job = job.with_timeout(timeout);
        }
        job.analysis = analysis;

        let id = job.id;
        self.jobs
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(job)));
        debug!("创建任务: {}", id);
        id
    }

    /// 提交任务进入执行池
    ///
    /// 只有Pending状态可以提交，重复提交返回false。任务进入
    /// Running后在池内异步执行；执行前后各做一次取消检查，
    /// 执行期间取消令牌可直接中断远程调用。
    pub async fn submit_job<F, Fut>(&self, id: Uuid, exec_fn: F) -> GridResult<bool>
    where
        F: FnOnce(ExecutionJob) -> Fut + Send + 'static,
        Fut: Future<Output = GridResult<serde_json::Value>> + Send,
    {
        let handle = self.job_handle(id).await?;

        let snapshot = {
            let mut job = handle.write().await;
            if job.status != JobStatus::Pending {
                debug!("任务 {} 状态为 {}，拒绝提交", id, job.status);
                return Ok(false);
            }
            if !job.mark_running() {
                return Ok(false);
            }
            job.clone()
        };

        let pool = Arc::clone(&self.pool);
        let token = snapshot.cancel_token.clone();

        tokio::spawn(async move {
            let _permit = match pool.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    // 信号量只在进程退出时关闭
                    return;
                }
            };

            // 取消可能发生在排队等待执行槽期间
            if token.is_cancelled() {
                debug!("任务 {} 在执行前已取消", id);
                return;
            }

            let execution = exec_fn(snapshot);
            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    info!("任务 {} 执行中被取消，中断远程调用", id);
                    return;
                }
                outcome = execution => outcome,
            };

            // 远程调用返回瞬间的取消以取消为准
            if token.is_cancelled() {
                debug!("任务 {} 在执行结束时已取消", id);
                return;
            }

            let mut job = handle.write().await;
            match outcome {
                Ok(result) => {
                    if job.finish(result) {
                        info!("任务 {} 执行完成", id);
                    }
                }
                Err(e) => {
                    if job.fail(e.to_string()) {
                        if e.is_fatal() {
                            error!("任务 {} 执行失败: {}", id, e);
                        } else {
                            warn!("任务 {} 执行失败: {}", id, e);
                        }
                    }
                }
            }
        });

        Ok(true)
    }

    /// 取消任务：触发取消令牌并写入终止状态
    ///
    /// 已终止的任务返回false且不做任何改动。
    pub async fn cancel_job(&self, id: Uuid) -> GridResult<bool> {
        let handle = self.job_handle(id).await?;
        let mut job = handle.write().await;

        if !job.status.is_cancellable() {
            return Ok(false);
        }

        let ok = job.force_terminal(JobStatus::Cancelled, Some("Job was cancelled".to_string()));
        if ok {
            info!("任务 {} 已取消", id);
        }
        Ok(ok)
    }

    /// 清理终止时间早于截止点的任务，返回清除数量，可重复调用
    pub async fn cleanup_old_jobs(&self, max_age: ChronoDuration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut to_remove = Vec::new();

        {
            let jobs = self.jobs.read().await;
            for (id, handle) in jobs.iter() {
                let job = handle.read().await;
                if job.is_terminal() && job.completed_at.map(|t| t < cutoff).unwrap_or(false) {
                    to_remove.push(*id);
                }
            }
        }

        if to_remove.is_empty() {
            return 0;
        }

        let mut jobs = self.jobs.write().await;
        for id in &to_remove {
            jobs.remove(id);
        }
        info!("清理了 {} 个历史任务", to_remove.len());
        to_remove.len()
    }

    /// 自动选择完成后把Worker名写回任务
    pub async fn assign_worker(&self, id: Uuid, worker: &str) {
        let jobs = self.jobs.read().await;
        if let Some(handle) = jobs.get(&id) {
            handle.write().await.worker = Some(worker.to_string());
        }
    }

    pub async fn get_job(&self, id: Uuid) -> Option<ExecutionJob> {
        let jobs = self.jobs.read().await;
        match jobs.get(&id) {
            Some(handle) => Some(handle.read().await.clone()),
            None => None,
        }
    }

    /// 全部任务快照，可按用户过滤
    pub async fn list_jobs(&self, user_id: Option<&str>) -> Vec<ExecutionJob> {
        let jobs = self.jobs.read().await;
        let mut result = Vec::with_capacity(jobs.len());
        for handle in jobs.values() {
            let job = handle.read().await;
            if let Some(user) = user_id {
                if job.user_id != user {
                    continue;
                }
            }
            result.push(job.clone());
        }
        // 创建时间倒序，新任务在前
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    pub async fn running_jobs(&self) -> Vec<ExecutionJob> {
        let jobs = self.jobs.read().await;
        let mut result = Vec::new();
        for handle in jobs.values() {
            let job = handle.read().await;
            if job.status == JobStatus::Running {
                result.push(job.clone());
            }
        }
        result
    }

    /// 监控步进：超时的任务强制终止，其余刷新进度估算
    ///
    /// 终止状态检查保证超时只写一次，后续tick自然跳过。
    pub async fn monitor_tick(&self) {
        let handles: Vec<Arc<RwLock<ExecutionJob>>> =
            self.jobs.read().await.values().cloned().collect();

        for handle in handles {
            let mut job = handle.write().await;
            if job.status != JobStatus::Running {
                continue;
            }

            if job.is_overdue() {
                let timeout = job.timeout_seconds.unwrap_or(0);
                let id = job.id;
                if job.force_terminal(
                    JobStatus::Timeout,
                    Some(format!("Job timed out after {timeout} seconds")),
                ) {
                    warn!("任务 {} 超时（{}秒），已强制终止", id, timeout);
                }
                continue;
            }

            job.progress = job.advisory_progress();
        }
    }

    /// 任务统计，主机指标拿不到时报0
    pub async fn stats(&self) -> JobStatsSnapshot {
        let jobs = self.jobs.read().await;
        let mut by_status: HashMap<String, usize> = HashMap::new();
        let mut by_worker: HashMap<String, usize> = HashMap::new();
        let mut running = 0usize;
        let mut total_time = 0.0f64;
        let mut finished = 0usize;

        for handle in jobs.values() {
            let job = handle.read().await;
            *by_status.entry(job.status.to_string()).or_insert(0) += 1;
            let worker = job.worker.clone().unwrap_or_else(|| "unassigned".to_string());
            *by_worker.entry(worker).or_insert(0) += 1;

            if job.status == JobStatus::Running {
                running += 1;
            }
            if let (Some(started), Some(completed)) = (job.started_at, job.completed_at) {
                total_time += ((completed - started).num_milliseconds().max(0) as f64) / 1000.0;
                finished += 1;
            }
        }

        let avg_execution_time = if finished > 0 {
            (total_time / finished as f64 * 100.0).round() / 100.0
        } else {
            0.0
        };

        let (cpu, memory) = self.probe.usage();

        JobStatsSnapshot {
            total_jobs: jobs.len(),
            running_jobs: running,
            by_status,
            by_worker,
            avg_execution_time,
            current_cpu_usage: cpu,
            current_memory_usage: memory,
        }
    }

    async fn job_handle(&self, id: Uuid) -> GridResult<Arc<RwLock<ExecutionJob>>> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| GridError::job_not_found(id))
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("available_slots", &self.pool.available_permits())
            .finish()
    }
}
