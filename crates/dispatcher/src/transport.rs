use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use gridx_core::{AgentConfig, GridError, GridResult};
use gridx_domain::WorkerTelemetry;

/// Worker代理 /exec 的应答体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecReply {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub exit_code: i32,
}

/// 与Worker代理通信的抽象，测试时可替换
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// 存活探测，任何错误都视为离线
    async fn ping(&self, address: &str) -> bool;

    async fn status(&self, address: &str) -> GridResult<WorkerTelemetry>;

    async fn exec(
        &self,
        address: &str,
        command: &str,
        timeout: Option<Duration>,
    ) -> GridResult<ExecReply>;
}

/// 基于reqwest的代理客户端。代理固定提供
/// GET /ping、GET /status、POST /exec 三个接口。
pub struct HttpAgentClient {
    http_client: reqwest::Client,
    port: u16,
    ping_timeout: Duration,
    status_timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            port: config.port,
            ping_timeout: Duration::from_secs(config.ping_timeout_seconds),
            status_timeout: Duration::from_secs(config.status_timeout_seconds),
        }
    }

    fn base_url(&self, address: &str) -> String {
        // 配置里写了端口就尊重配置
        if address.contains(':') {
            format!("http://{address}")
        } else {
            format!("http://{}:{}", address, self.port)
        }
    }
}

#[async_trait]
impl AgentTransport for HttpAgentClient {
    async fn ping(&self, address: &str) -> bool {
        let url = format!("{}/ping", self.base_url(address));

        match self
            .http_client
            .get(&url)
            .timeout(self.ping_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Worker {} ping失败: {}", address, e);
                false
            }
        }
    }

    async fn status(&self, address: &str) -> GridResult<WorkerTelemetry> {
        let url = format!("{}/status", self.base_url(address));

        let response = self
            .http_client
            .get(&url)
            .timeout(self.status_timeout)
            .send()
            .await
            .map_err(|e| GridError::connection(format!("获取Worker状态失败: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Worker {} 状态接口返回 HTTP {}", address, status);
            return Err(GridError::connection(format!(
                "Worker状态接口返回 HTTP {status}"
            )));
        }

        response
            .json::<WorkerTelemetry>()
            .await
            .map_err(|e| GridError::connection(format!("解析Worker状态失败: {e}")))
    }

    async fn exec(
        &self,
        address: &str,
        command: &str,
        timeout: Option<Duration>,
    ) -> GridResult<ExecReply> {
        let url = format!("{}/exec", self.base_url(address));
        let body = json!({ "cmd": command });

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(t) = timeout {
            // 留一点余量让代理先按自身超时返回408
            request = request.timeout(t + Duration::from_secs(5));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                let seconds = timeout.map(|t| t.as_secs()).unwrap_or(0);
                return Err(GridError::DispatchTimeout { seconds });
            }
            Err(e) => {
                return Err(GridError::connection(format!("Worker连接失败: {e}")));
            }
        };

        match response.status() {
            status if status.is_success() => response
                .json::<ExecReply>()
                .await
                .map_err(|e| GridError::connection(format!("解析执行结果失败: {e}"))),
            status if status == reqwest::StatusCode::REQUEST_TIMEOUT => {
                let seconds = timeout.map(|t| t.as_secs()).unwrap_or(300);
                Err(GridError::DispatchTimeout { seconds })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(GridError::connection(format!(
                    "Worker执行接口返回 HTTP {status}: {body}"
                )))
            }
        }
    }
}
