use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::debug;

/// 任务统计快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatsSnapshot {
    pub total_jobs: usize,
    pub running_jobs: usize,
    pub by_status: HashMap<String, usize>,
    pub by_worker: HashMap<String, usize>,
    pub avg_execution_time: f64,
    pub current_cpu_usage: f64,
    pub current_memory_usage: f64,
}

/// 调度端主机指标探针，读不到就报0
pub struct SystemProbe {
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// (CPU使用率%, 内存使用率%)
    pub fn usage(&self) -> (f64, f64) {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                debug!("主机指标锁中毒，按0上报");
                poisoned.into_inner()
            }
        };

        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu = f64::from(system.global_cpu_usage());
        let total = system.total_memory();
        let memory = if total > 0 {
            system.used_memory() as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        (cpu, memory)
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}
