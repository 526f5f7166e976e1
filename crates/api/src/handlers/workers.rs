use axum::extract::State;
use serde_json::json;

use gridx_core::GridError;

use crate::{error::ApiResult, response::success, routes::AppState};

/// 选出当前最空闲的Worker
pub async fn best_worker(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let best = state
        .registry
        .select_best()
        .await
        .ok_or(GridError::NoEligibleWorker)?;

    let reason = format!(
        "cpu {:.1}%, memory {:.1}%, gpus {}",
        best.telemetry.cpu_percent, best.telemetry.memory_percent, best.gpus
    );
    Ok(success(json!({
        "name": best.name,
        "address": best.address,
        "gpus": best.gpus,
        "telemetry": best.telemetry,
        "reason": reason,
    })))
}

/// 在线Worker及其实时负载
pub async fn online_workers(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let workers = state.registry.online_workers().await;
    let count = workers.len();
    Ok(success(json!({ "workers": workers, "count": count })))
}
