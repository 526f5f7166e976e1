//! # Grid-X API
//!
//! 远程代码执行系统的REST API模块，基于Axum构建。
//!
//! ## API 端点
//!
//! ### 代码准入与执行
//! - `POST /api/exec/analyze` - 静态分析代码
//! - `POST /api/exec/safe-execute` - 准入分析通过后异步执行
//! - `POST /api/exec` - 直接执行命令（可自动选择Worker）
//! - `POST /api/exec/batch` - 批量执行
//!
//! ### 任务管理
//! - `GET /api/exec/jobs` - 获取任务列表
//! - `GET /api/exec/jobs/{id}` - 获取任务详情
//! - `POST /api/exec/jobs/{id}/control` - 任务控制（取消）
//! - `DELETE /api/exec/jobs/cleanup` - 清理历史任务
//!
//! ### Worker管理
//! - `GET /api/exec/workers/best` - 最空闲的Worker
//! - `GET /api/exec/workers/online` - 在线Worker列表
//!
//! ### 管理视图
//! - `GET /api/admin/stats` - 请求与任务统计
//! - `GET /api/admin/requests` - 请求日志
//! - `DELETE /api/admin/requests` - 清空请求日志
//!
//! ### 系统
//! - `GET /health` - 健康检查
//!
//! ## 响应格式
//!
//! 成功响应统一包裹为 `{success, data, message, timestamp}`；
//! 错误响应为 `{error: {message, type, code, suggestions, timestamp}}`。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use middleware::{RequestLog, RequestLogEntry, RequestStats};
pub use response::ApiResponse;
pub use routes::{create_routes, AppState};
