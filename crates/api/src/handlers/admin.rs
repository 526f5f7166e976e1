use axum::extract::State;
use serde_json::json;

use crate::{
    error::ApiResult,
    response::{success, ApiResponse},
    routes::AppState,
};

/// 请求统计 + 任务池统计
pub async fn get_stats(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let jobs = state.manager.stats().await;
    let requests = state.request_log.stats();
    Ok(success(json!({
        "jobs": jobs,
        "requests": requests,
    })))
}

/// 最近的请求日志
pub async fn get_request_log(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let entries = state.request_log.entries();
    let count = entries.len();
    Ok(success(json!({ "requests": entries, "count": count })))
}

/// 清空请求日志和计数器
pub async fn clear_request_log(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state.request_log.clear();
    Ok(ApiResponse::success_empty_with_message(
        "请求日志已清空".to_string(),
    ))
}
