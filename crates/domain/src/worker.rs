use serde::{Deserialize, Serialize};

/// 静态Worker目录条目，注册顺序即目录顺序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPeer {
    pub name: String,
    pub address: String,
    pub resources: WorkerResources,
}

/// 资源规格仅作提示，调度只看实时遥测
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorkerResources {
    pub cpus: u32,
    pub memory_gb: u32,
    pub gpus: u32,
}

impl WorkerPeer {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            resources: WorkerResources::default(),
        }
    }
    pub fn with_resources(mut self, cpus: u32, memory_gb: u32, gpus: u32) -> Self {
        self.resources = WorkerResources {
            cpus,
            memory_gb,
            gpus,
        };
        self
    }
}

/// Worker代理 /status 返回的实时负载
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerTelemetry {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl WorkerTelemetry {
    /// 综合负载分数，越小越空闲
    pub fn load_score(&self) -> f64 {
        self.cpu_percent + self.memory_percent
    }
}

/// 在线Worker快照，选择器排序的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineWorker {
    pub name: String,
    pub address: String,
    pub gpus: u32,
    pub telemetry: WorkerTelemetry,
}
