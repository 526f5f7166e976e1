use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, info};

/// 进程级关闭信号
///
/// 触发一次即广播给所有订阅者；触发之后的订阅也能立刻收到信号，
/// 不会错过已经发生的关闭。
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    fired: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self {
            tx,
            fired: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        let rx = self.tx.subscribe();
        if self.fired.load(Ordering::SeqCst) {
            // 迟到的订阅者补发一次，已收到过的订阅者多收一个()无妨
            let _ = self.tx.send(());
        }
        rx
    }

    /// 触发关闭，重复触发是无操作
    pub fn trigger(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("关闭信号已触发过");
            return;
        }
        info!("发送关闭信号给 {} 个订阅者", self.tx.receiver_count());
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
