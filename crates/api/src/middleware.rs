use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::routes::AppState;

/// 单条请求记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub endpoint: String,
    pub status: u16,
    pub duration_ms: u64,
    pub success: bool,
}

/// 请求统计汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStats {
    pub total_requests: u64,
    pub by_method: HashMap<String, u64>,
    pub by_endpoint: HashMap<String, u64>,
    pub by_worker: HashMap<String, u64>,
    pub success_rate: f64,
}

/// 容量封顶的请求日志环形缓冲
///
/// 挂在AppState里随应用传递，计数器随记录同步更新，
/// 清空日志也会把计数器归零。
pub struct RequestLog {
    capacity: usize,
    inner: Mutex<RequestLogInner>,
}

#[derive(Default)]
struct RequestLogInner {
    entries: VecDeque<RequestLogEntry>,
    total: u64,
    success: u64,
    by_method: HashMap<String, u64>,
    by_endpoint: HashMap<String, u64>,
    by_worker: HashMap<String, u64>,
}

impl RequestLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(RequestLogInner::default()),
        }
    }

    pub fn record(&self, entry: RequestLogEntry) {
        let mut inner = self.lock();
        inner.total += 1;
        if entry.success {
            inner.success += 1;
        }
        *inner.by_method.entry(entry.method.clone()).or_insert(0) += 1;
        *inner.by_endpoint.entry(entry.endpoint.clone()).or_insert(0) += 1;

        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
    }

    /// 处理器解析出执行目标后补记Worker维度
    pub fn record_worker(&self, worker: &str) {
        let mut inner = self.lock();
        *inner.by_worker.entry(worker.to_string()).or_insert(0) += 1;
    }

    /// 最近的请求，旧的在前
    pub fn entries(&self) -> Vec<RequestLogEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    pub fn stats(&self) -> RequestStats {
        let inner = self.lock();
        let success_rate = if inner.total > 0 {
            (inner.success as f64 / inner.total as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        RequestStats {
            total_requests: inner.total,
            by_method: inner.by_method.clone(),
            by_endpoint: inner.by_endpoint.clone(),
            by_worker: inner.by_worker.clone(),
            success_rate,
        }
    }

    pub fn clear(&self) {
        *self.lock() = RequestLogInner::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RequestLogInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub async fn request_logging(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    info!(
        "完成请求处理: {} {} - 状态: {} - 耗时: {:?}",
        method, uri, status, duration
    );

    state.request_log.record(RequestLogEntry {
        timestamp: Utc::now(),
        method: method.to_string(),
        endpoint: uri.path().to_string(),
        status: status.as_u16(),
        duration_ms: duration.as_millis() as u64,
        success: status.is_success(),
    });

    response
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

pub fn trace_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
}
