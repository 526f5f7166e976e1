use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

use gridx_analyzer::PythonAnalyzer;
use gridx_api::{create_routes, AppState, RequestLog};
use gridx_core::AppConfig;
use gridx_dispatcher::{AgentTransport, ExecDispatcher, HttpAgentClient, WorkerRegistry};
use gridx_jobs::{ExecutionService, JobManager, JobMonitor};

/// 主应用程序：组装所有组件并运行API服务器与任务监控
pub struct Application {
    config: AppConfig,
    state: AppState,
}

impl Application {
    /// 按依赖顺序组装组件，不依赖任何全局单例
    pub fn new(config: AppConfig) -> Self {
        let transport: Arc<dyn AgentTransport> = Arc::new(HttpAgentClient::new(&config.agent));
        let registry = Arc::new(WorkerRegistry::from_config(
            &config.workers,
            Arc::clone(&transport),
        ));
        let dispatcher = Arc::new(ExecDispatcher::new(Arc::clone(&registry), transport));
        let manager = Arc::new(JobManager::new(config.pool.max_concurrent_jobs));
        let service = Arc::new(ExecutionService::new(
            Arc::new(PythonAnalyzer::new()),
            Arc::clone(&manager),
            Arc::clone(&dispatcher),
            config.pool.default_timeout_seconds,
        ));

        let state = AppState {
            manager,
            registry,
            dispatcher,
            service,
            request_log: Arc::new(RequestLog::new(config.api.request_log_capacity)),
            cleanup_max_age_hours: config.cleanup.max_age_hours as i64,
        };

        Self { config, state }
    }

    /// 运行应用程序直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            "已注册 {} 个Worker节点，任务池容量 {}",
            self.state.registry.peers().len(),
            self.config.pool.max_concurrent_jobs
        );

        let monitor_handle = JobMonitor::new(
            Arc::clone(&self.state.manager),
            self.config.pool.monitor_interval_seconds,
        )
        .start(shutdown_rx.resubscribe());

        let app = create_routes(self.state.clone());
        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;
        info!("API服务器监听 {}", self.config.api.bind_address);

        let mut shutdown_rx = shutdown_rx;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .context("API服务器运行失败")?;

        let _ = monitor_handle.await;
        info!("应用组件已全部停止");
        Ok(())
    }
}
