use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use gridx_core::GridError;

use crate::{
    error::{ApiError, ApiResult},
    response::{success, ApiResponse},
    routes::AppState,
};

/// 任务列表查询参数
#[derive(Debug, Deserialize)]
pub struct JobQueryParams {
    pub user_id: Option<String>,
}

/// 任务控制请求
#[derive(Debug, Deserialize)]
pub struct JobControlRequest {
    pub action: String,
}

/// 清理参数
#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    pub max_age_hours: Option<i64>,
}

/// 获取任务列表，可按用户过滤
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobQueryParams>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let jobs = state.manager.list_jobs(params.user_id.as_deref()).await;
    let summaries: Vec<_> = jobs
        .iter()
        .map(|job| {
            json!({
                "id": job.id,
                "status": job.status,
                "worker": job.worker,
                "user_id": job.user_id,
                "priority": job.priority,
                "progress": job.progress,
                "created_at": job.created_at,
                "started_at": job.started_at,
                "completed_at": job.completed_at,
            })
        })
        .collect();
    let count = summaries.len();
    Ok(success(json!({ "jobs": summaries, "count": count })))
}

/// 获取单个任务的完整信息
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let job = state
        .manager
        .get_job(id)
        .await
        .ok_or(GridError::JobNotFound { id })?;
    Ok(success(job))
}

/// 任务控制：目前只支持取消
pub async fn control_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<JobControlRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    match request.action.as_str() {
        "cancel" => {
            let cancelled = state.manager.cancel_job(id).await?;
            if !cancelled {
                return Err(ApiError::Grid(GridError::invalid_transition(format!(
                    "任务 {} 已处于终止状态",
                    id
                ))));
            }
            Ok(ApiResponse::success_with_message(
                json!({ "job_id": id }),
                "任务已取消".to_string(),
            ))
        }
        other => Err(ApiError::BadRequest(format!("不支持的操作: {}", other))),
    }
}

/// 清理超过保留时长的历史任务
pub async fn cleanup_jobs(
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let hours = params.max_age_hours.unwrap_or(state.cleanup_max_age_hours);
    if hours <= 0 {
        return Err(ApiError::BadRequest(
            "max_age_hours 必须是正数".to_string(),
        ));
    }

    let removed = state
        .manager
        .cleanup_old_jobs(ChronoDuration::hours(hours))
        .await;
    Ok(success(json!({ "removed": removed })))
}
