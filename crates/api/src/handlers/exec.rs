use std::time::Duration;

use axum::{extract::State, Json};
use serde::Deserialize;

use gridx_jobs::{ExecuteRequest, SubmitOutcome};

use crate::{
    error::{ApiError, ApiResult},
    response::{accepted, success},
    routes::AppState,
};

/// 代码分析请求
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub code: String,
}

/// 直接执行请求
#[derive(Debug, Deserialize)]
pub struct DirectExecRequest {
    pub command: String,
    #[serde(default)]
    pub worker: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// 批量执行请求
#[derive(Debug, Deserialize)]
pub struct BatchExecRequest {
    pub workers: Vec<String>,
    pub command: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// 静态分析代码，不执行
pub async fn analyze_code(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let report = state.service.analyze(&request.code);
    Ok(success(report))
}

/// 受检执行：准入分析通过后入池异步执行
pub async fn safe_execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    if request.code.trim().is_empty() {
        return Err(ApiError::BadRequest("code 不能为空".to_string()));
    }

    match state.service.safe_execute(request).await? {
        SubmitOutcome::Accepted { job_id } => {
            Ok(accepted(serde_json::json!({ "job_id": job_id })))
        }
        SubmitOutcome::Rejected { analysis } => {
            Err(ApiError::AnalysisRejected(Box::new(analysis)))
        }
    }
}

/// 直接在Worker上执行命令，不指定Worker时自动选择
pub async fn direct_exec(
    State(state): State<AppState>,
    Json(request): Json<DirectExecRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    if request.command.trim().is_empty() {
        return Err(ApiError::BadRequest("command 不能为空".to_string()));
    }

    let timeout = request.timeout_seconds.map(Duration::from_secs);
    let report = match request.worker {
        Some(name) => {
            let outcome = state.dispatcher.dispatch(&name, &request.command, timeout).await;
            gridx_dispatcher::DispatchReport {
                worker: Some(name),
                auto_selected: false,
                outcome,
            }
        }
        None => state.dispatcher.dispatch_auto(&request.command, timeout).await,
    };

    if let Some(ref worker) = report.worker {
        state.request_log.record_worker(worker);
    }
    Ok(success(report))
}

/// 并发地在多个Worker上执行同一命令，`["all"]` 表示全部
pub async fn batch_exec(
    State(state): State<AppState>,
    Json(request): Json<BatchExecRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    if request.workers.is_empty() {
        return Err(ApiError::BadRequest("workers 不能为空".to_string()));
    }
    if request.command.trim().is_empty() {
        return Err(ApiError::BadRequest("command 不能为空".to_string()));
    }

    let timeout = request.timeout_seconds.map(Duration::from_secs);
    let report = state
        .dispatcher
        .batch_dispatch(&request.workers, &request.command, timeout)
        .await;

    for worker in report.results.keys() {
        state.request_log.record_worker(worker);
    }
    Ok(success(report))
}
