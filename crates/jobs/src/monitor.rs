use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::manager::JobManager;

/// 任务监控循环
///
/// 每秒巡检一次执行中的任务：超时强制终止、刷新进度。
/// 单次巡检的问题不会让循环停下。
pub struct JobMonitor {
    manager: Arc<JobManager>,
    tick: Duration,
}

impl JobMonitor {
    pub fn new(manager: Arc<JobManager>, tick_seconds: u64) -> Self {
        Self {
            manager,
            tick: Duration::from_secs(tick_seconds.max(1)),
        }
    }

    pub fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        info!("启动任务监控，巡检间隔 {:?}", self.tick);

        tokio::spawn(async move {
            let mut ticker = interval(self.tick);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.manager.monitor_tick().await;
                        debug!("任务巡检完成");
                    }
                    _ = shutdown_rx.recv() => {
                        info!("任务监控收到关闭信号，退出");
                        break;
                    }
                }
            }
        })
    }
}
