use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use gridx_dispatcher::{ExecDispatcher, WorkerRegistry};
use gridx_jobs::{ExecutionService, JobManager};

use crate::handlers::{
    admin::{clear_request_log, get_request_log, get_stats},
    exec::{analyze_code, batch_exec, direct_exec, safe_execute},
    health::health_check,
    jobs::{cleanup_jobs, control_job, get_job, list_jobs},
    workers::{best_worker, online_workers},
};
use crate::middleware::{cors_layer, request_logging, trace_layer, RequestLog};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
    pub registry: Arc<WorkerRegistry>,
    pub dispatcher: Arc<ExecDispatcher>,
    pub service: Arc<ExecutionService>,
    pub request_log: Arc<RequestLog>,
    /// 清理接口不带参数时的默认保留时长
    pub cleanup_max_age_hours: i64,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 代码准入与执行API
        .route("/api/exec", post(direct_exec))
        .route("/api/exec/analyze", post(analyze_code))
        .route("/api/exec/safe-execute", post(safe_execute))
        .route("/api/exec/batch", post(batch_exec))
        // 任务管理API
        .route("/api/exec/jobs", get(list_jobs))
        .route("/api/exec/jobs/cleanup", delete(cleanup_jobs))
        .route("/api/exec/jobs/{id}", get(get_job))
        .route("/api/exec/jobs/{id}/control", post(control_job))
        // Worker管理API
        .route("/api/exec/workers/best", get(best_worker))
        .route("/api/exec/workers/online", get(online_workers))
        // 管理视图API
        .route("/api/admin/stats", get(get_stats))
        .route(
            "/api/admin/requests",
            get(get_request_log).delete(clear_request_log),
        )
        .layer(from_fn_with_state(state.clone(), request_logging))
        .layer(cors_layer())
        .layer(trace_layer())
        .with_state(state)
}
