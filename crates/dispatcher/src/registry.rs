use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use gridx_core::{GridError, GridResult, WorkerPeerConfig};
use gridx_domain::{OnlineWorker, WorkerPeer};

use crate::transport::AgentTransport;

/// Worker目录与选择器
///
/// 目录来自配置，顺序即注册顺序。选择不做缓存：每次调用
/// 都重新探测存活并拉取实时负载。
pub struct WorkerRegistry {
    peers: Vec<WorkerPeer>,
    transport: Arc<dyn AgentTransport>,
}

impl WorkerRegistry {
    pub fn new(peers: Vec<WorkerPeer>, transport: Arc<dyn AgentTransport>) -> Self {
        Self { peers, transport }
    }

    pub fn from_config(
        configs: &[WorkerPeerConfig],
        transport: Arc<dyn AgentTransport>,
    ) -> Self {
        let peers = configs
            .iter()
            .map(|c| {
                WorkerPeer::new(c.name.clone(), c.address.clone()).with_resources(
                    c.cpus,
                    c.memory_gb,
                    c.gpus,
                )
            })
            .collect();
        Self::new(peers, transport)
    }

    pub fn peers(&self) -> &[WorkerPeer] {
        &self.peers
    }

    pub fn find_peer(&self, name: &str) -> Option<&WorkerPeer> {
        self.peers.iter().find(|p| p.name == name)
    }

    /// 并发探测所有Worker，返回在线者及其实时负载，保持注册顺序
    pub async fn online_workers(&self) -> Vec<OnlineWorker> {
        let probes = self.peers.iter().map(|peer| async {
            if !self.transport.ping(&peer.address).await {
                return None;
            }
            match self.transport.status(&peer.address).await {
                Ok(telemetry) => Some(OnlineWorker {
                    name: peer.name.clone(),
                    address: peer.address.clone(),
                    gpus: peer.resources.gpus,
                    telemetry,
                }),
                Err(e) => {
                    // 能ping通但状态拉不到，视为离线
                    warn!("Worker {} 状态获取失败: {}", peer.name, e);
                    None
                }
            }
        });

        join_all(probes).await.into_iter().flatten().collect()
    }

    /// 选出当前最空闲的Worker
    ///
    /// 排序键：负载(cpu%+mem%)升序，GPU数降序，注册顺序兜底。
    /// 没有在线Worker时返回None，由调用方决定如何报告。
    pub async fn select_best(&self) -> Option<OnlineWorker> {
        let mut online = self.online_workers().await;
        if online.is_empty() {
            debug!("没有在线的Worker节点");
            return None;
        }

        // 稳定排序保证负载与GPU都相同时按注册顺序取先者
        online.sort_by(|a, b| {
            a.telemetry
                .load_score()
                .partial_cmp(&b.telemetry.load_score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.gpus.cmp(&a.gpus))
        });

        let best = online.into_iter().next();
        if let Some(ref worker) = best {
            debug!(
                "选择Worker: {} (负载: {:.1}%, GPU: {})",
                worker.name,
                worker.telemetry.load_score(),
                worker.gpus
            );
        }
        best
    }

    /// 解析执行目标：显式指定的Worker必须在目录里
    pub fn resolve_target(&self, name: &str) -> GridResult<&WorkerPeer> {
        self.find_peer(name)
            .ok_or_else(|| GridError::worker_not_found(name))
    }
}
