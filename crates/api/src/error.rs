use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gridx_core::GridError;
use gridx_domain::AnalysisReport;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度错误: {0}")]
    Grid(#[from] GridError),

    #[error("代码未通过准入分析")]
    AnalysisRejected(Box<AnalysisReport>),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 准入拦截要把完整分析报告带给调用方
        if let ApiError::AnalysisRejected(report) = self {
            let body = Json(json!({
                "error": {
                    "message": "代码未通过准入分析，存在高危问题",
                    "type": "ANALYSIS_REJECTED",
                    "code": StatusCode::BAD_REQUEST.as_u16(),
                    "suggestions": [
                        "根据分析报告修改代码后重新提交",
                        "确认风险可控时可带 allow_risky=true 重试",
                    ],
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                },
                "analysis": *report,
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, error_message, error_type, suggestions) = match &self {
            ApiError::Grid(GridError::JobNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("任务 {} 不存在", id),
                "JOB_NOT_FOUND".to_string(),
                vec![
                    "请检查任务ID是否正确".to_string(),
                    "使用 GET /api/exec/jobs 查看所有任务".to_string(),
                ],
            ),
            ApiError::Grid(GridError::WorkerNotFound { name }) => (
                StatusCode::NOT_FOUND,
                format!("Worker {} 不存在", name),
                "WORKER_NOT_FOUND".to_string(),
                vec![
                    "请检查Worker名称是否正确".to_string(),
                    "使用 GET /api/exec/workers/online 查看在线Worker".to_string(),
                ],
            ),
            ApiError::Grid(GridError::NoEligibleWorker) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "没有可用的Worker节点".to_string(),
                "NO_ELIGIBLE_WORKER".to_string(),
                vec![
                    "请确认Worker代理进程正在运行".to_string(),
                    "使用 GET /api/exec/workers/online 查看在线状态".to_string(),
                ],
            ),
            ApiError::Grid(GridError::InvalidTransition(msg)) => (
                StatusCode::CONFLICT,
                format!("任务状态不允许该操作: {}", msg),
                "INVALID_TRANSITION".to_string(),
                vec![
                    "已终止的任务不能再取消".to_string(),
                    "使用 GET /api/exec/jobs/{id} 查看任务当前状态".to_string(),
                ],
            ),
            ApiError::Grid(GridError::DispatchTimeout { seconds }) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("远程执行超时: {}秒", seconds),
                "DISPATCH_TIMEOUT".to_string(),
                vec![
                    "可以增大 timeout_seconds 后重试".to_string(),
                    "请检查目标Worker的负载情况".to_string(),
                ],
            ),
            ApiError::Grid(GridError::DispatchConnection(reason)) => (
                StatusCode::BAD_GATEWAY,
                format!("Worker连接失败: {}", reason),
                "DISPATCH_CONNECTION".to_string(),
                vec![
                    "请确认Worker代理地址和端口配置正确".to_string(),
                    "请检查网络连通性".to_string(),
                ],
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {}", msg),
                "BAD_REQUEST".to_string(),
                vec![
                    "请检查请求格式和参数".to_string(),
                    "确保Content-Type正确设置".to_string(),
                ],
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND".to_string(),
                vec!["请检查请求URL是否正确".to_string()],
            ),
            ApiError::Serialization(err) => (
                StatusCode::BAD_REQUEST,
                "请求数据格式错误".to_string(),
                "SERIALIZATION_ERROR".to_string(),
                vec![
                    "请检查JSON格式是否正确".to_string(),
                    format!("详细错误: {}", err),
                ],
            ),
            ApiError::Grid(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.user_message().to_string(),
                "INTERNAL_ERROR".to_string(),
                vec![
                    format!("错误详情: {}", err),
                    "查看 GET /health 检查系统状态".to_string(),
                ],
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "系统内部错误".to_string(),
                "INTERNAL_ERROR".to_string(),
                vec![
                    "系统遇到内部错误，请稍后重试".to_string(),
                    format!("错误详情: {}", msg),
                ],
            ),
            ApiError::AnalysisRejected(_) => unreachable!("handled above"),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
