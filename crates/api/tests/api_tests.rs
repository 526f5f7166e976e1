use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use gridx_analyzer::PythonAnalyzer;
use gridx_api::{create_routes, AppState, RequestLog};
use gridx_core::{GridError, GridResult};
use gridx_dispatcher::{AgentTransport, ExecDispatcher, ExecReply, WorkerRegistry};
use gridx_domain::{WorkerPeer, WorkerTelemetry};
use gridx_jobs::{ExecutionService, JobManager};

/// 可配置的代理桩
struct StubTransport {
    online: bool,
    exit_code: i32,
}

#[async_trait]
impl AgentTransport for StubTransport {
    async fn ping(&self, _address: &str) -> bool {
        self.online
    }

    async fn status(&self, _address: &str) -> GridResult<WorkerTelemetry> {
        if !self.online {
            return Err(GridError::connection("offline"));
        }
        Ok(WorkerTelemetry {
            cpu_percent: 12.5,
            memory_percent: 40.0,
            hostname: Some("node-a.local".to_string()),
        })
    }

    async fn exec(
        &self,
        _address: &str,
        _command: &str,
        _timeout: Option<Duration>,
    ) -> GridResult<ExecReply> {
        Ok(ExecReply {
            output: "hello\n".to_string(),
            error: String::new(),
            exit_code: self.exit_code,
        })
    }
}

fn test_app_with(transport: StubTransport) -> (Router, Arc<JobManager>) {
    let transport: Arc<dyn AgentTransport> = Arc::new(transport);
    let registry = Arc::new(WorkerRegistry::new(
        vec![WorkerPeer::new("node-a", "10.0.0.1")],
        Arc::clone(&transport),
    ));
    let dispatcher = Arc::new(ExecDispatcher::new(Arc::clone(&registry), transport));
    let manager = Arc::new(JobManager::new(5));
    let service = Arc::new(ExecutionService::new(
        Arc::new(PythonAnalyzer::new()),
        Arc::clone(&manager),
        Arc::clone(&dispatcher),
        30,
    ));

    let state = AppState {
        manager: Arc::clone(&manager),
        registry,
        dispatcher,
        service,
        request_log: Arc::new(RequestLog::new(200)),
        cleanup_max_age_hours: 24,
    };
    (create_routes(state), manager)
}

fn test_app() -> Router {
    test_app_with(StubTransport {
        online: true,
        exit_code: 0,
    })
    .0
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, body) = get_json(test_app(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "gridx");
}

#[tokio::test]
async fn test_analyze_flags_infinite_loop() {
    let (status, body) = post_json(
        test_app(),
        "/api/exec/analyze",
        json!({"code": "while True:\n    pass\n"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["should_execute"], false);
    assert!(report["analysis_summary"]["high_severity"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_safe_execute_rejects_with_analysis_payload() {
    let (status, body) = post_json(
        test_app(),
        "/api/exec/safe-execute",
        json!({"code": "while True:\n    pass\n"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "ANALYSIS_REJECTED");
    // 拒绝响应携带完整分析报告
    assert_eq!(body["analysis"]["should_execute"], false);
    assert!(body["analysis"]["issues"].as_array().unwrap().len() >= 1);
}

#[tokio::test]
async fn test_safe_execute_accepts_and_completes() {
    let (app, manager) = test_app_with(StubTransport {
        online: true,
        exit_code: 0,
    });

    let (status, body) = post_json(
        app.clone(),
        "/api/exec/safe-execute",
        json!({"code": "print('hello')\n"}),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["data"]["job_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, body) = get_json(app, &format!("/api/exec/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["result"]["output"], "hello\n");

    let job = manager
        .get_job(job_id.parse().unwrap())
        .await
        .expect("job exists");
    assert_eq!(job.worker.as_deref(), Some("node-a"));
}

#[tokio::test]
async fn test_safe_execute_empty_code_is_bad_request() {
    let (status, body) = post_json(
        test_app(),
        "/api/exec/safe-execute",
        json!({"code": "   "}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_direct_exec_auto_selects_worker() {
    let (status, body) = post_json(
        test_app(),
        "/api/exec",
        json!({"command": "echo hello"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["worker"], "node-a");
    assert_eq!(report["auto_selected"], true);
    assert_eq!(report["status"], "success");
    assert_eq!(report["output"], "hello\n");
}

#[tokio::test]
async fn test_direct_exec_unknown_worker_is_tagged() {
    let (status, body) = post_json(
        test_app(),
        "/api/exec",
        json!({"command": "echo hi", "worker": "ghost"}),
    )
    .await;

    // 派发失败是带标签的正常结果，不是HTTP错误
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "worker_not_found");
}

#[tokio::test]
async fn test_direct_exec_no_online_worker_is_tagged() {
    let (app, _) = test_app_with(StubTransport {
        online: false,
        exit_code: 0,
    });
    let (status, body) = post_json(app, "/api/exec", json!({"command": "echo hi"})).await;

    // 无在线Worker有自己的标签，不是连接失败
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "no_eligible_worker");
    assert!(body["data"]["worker"].is_null());
}

#[tokio::test]
async fn test_batch_exec_empty_targets_rejected() {
    let (status, body) = post_json(
        test_app(),
        "/api/exec/batch",
        json!({"workers": [], "command": "echo hi"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_batch_exec_all_expands_directory() {
    let (status, body) = post_json(
        test_app(),
        "/api/exec/batch",
        json!({"workers": ["all"], "command": "echo hi"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["total"], 1);
    assert_eq!(report["success_count"], 1);
    assert_eq!(report["results"]["node-a"]["status"], "success");
}

#[tokio::test]
async fn test_best_worker_returns_reason() {
    let (status, body) = get_json(test_app(), "/api/exec/workers/best").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "node-a");
    assert!(body["data"]["reason"].as_str().unwrap().contains("cpu"));
}

#[tokio::test]
async fn test_best_worker_unavailable_is_503() {
    let (app, _) = test_app_with(StubTransport {
        online: false,
        exit_code: 0,
    });
    let (status, body) = get_json(app, "/api/exec/workers/best").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["type"], "NO_ELIGIBLE_WORKER");
}

#[tokio::test]
async fn test_online_workers_lists_telemetry() {
    let (status, body) = get_json(test_app(), "/api/exec/workers/online").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["workers"][0]["telemetry"]["cpu_percent"], 12.5);
}

#[tokio::test]
async fn test_job_not_found_is_404() {
    let (status, body) = get_json(
        test_app(),
        "/api/exec/jobs/00000000-0000-0000-0000-000000000000",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "JOB_NOT_FOUND");
}

#[tokio::test]
async fn test_control_unknown_action_is_400() {
    let (app, manager) = test_app_with(StubTransport {
        online: true,
        exit_code: 0,
    });
    let id = manager
        .create_job(
            "print(1)".to_string(),
            None,
            None,
            Default::default(),
            Some(30),
            None,
        )
        .await;

    let (status, body) = post_json(
        app,
        &format!("/api/exec/jobs/{id}/control"),
        json!({"action": "pause"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_cancel_pending_job() {
    let (app, manager) = test_app_with(StubTransport {
        online: true,
        exit_code: 0,
    });
    let id = manager
        .create_job(
            "print(1)".to_string(),
            None,
            None,
            Default::default(),
            Some(30),
            None,
        )
        .await;

    let (status, body) = post_json(
        app.clone(),
        &format!("/api/exec/jobs/{id}/control"),
        json!({"action": "cancel"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // 已终止的任务再取消 → 409
    let (status, body) = post_json(
        app,
        &format!("/api/exec/jobs/{id}/control"),
        json!({"action": "cancel"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_cleanup_rejects_non_positive_age() {
    let (status, _body) = {
        let app = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/exec/jobs/cleanup?max_age_hours=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    };

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_requests_ring_buffer_and_reset() {
    let app = test_app();

    let (status, _) = get_json(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_json(app.clone(), "/api/admin/requests").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["count"].as_u64().unwrap() >= 1);
    assert_eq!(body["data"]["requests"][0]["endpoint"], "/health");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/requests")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = get_json(app, "/api/admin/requests").await;
    // 清空后只剩本次查询之前的DELETE记录
    let count = body["data"]["count"].as_u64().unwrap();
    assert!(count <= 1);
}

#[tokio::test]
async fn test_admin_stats_combines_jobs_and_requests() {
    let app = test_app();

    let (_, _) = get_json(app.clone(), "/health").await;
    let (status, body) = get_json(app, "/api/admin/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["jobs"]["total_jobs"].is_number());
    assert!(body["data"]["requests"]["total_requests"].as_u64().unwrap() >= 1);
}
