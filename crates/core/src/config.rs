use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub pool: PoolConfig,
    pub agent: AgentConfig,
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub workers: Vec<WorkerPeerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_address: String,
    pub request_log_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_concurrent_jobs: usize,
    pub monitor_interval_seconds: u64,
    pub default_timeout_seconds: u64,
}

/// Worker代理访问参数，代理固定监听7576端口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub port: u16,
    pub ping_timeout_seconds: u64,
    pub status_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub max_age_hours: u64,
}

/// 静态Worker目录条目，资源字段仅作提示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPeerConfig {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub memory_gb: u32,
    #[serde(default)]
    pub gpus: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                bind_address: "0.0.0.0:8080".to_string(),
                request_log_capacity: 200,
            },
            pool: PoolConfig {
                max_concurrent_jobs: 5,
                monitor_interval_seconds: 1,
                default_timeout_seconds: 30,
            },
            agent: AgentConfig {
                port: 7576,
                ping_timeout_seconds: 2,
                status_timeout_seconds: 3,
            },
            cleanup: CleanupConfig { max_age_hours: 24 },
            workers: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/gridx.toml", "gridx.toml", "/etc/gridx/config.toml"];

            let mut config_file_found = false;
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    config_file_found = true;
                    break;
                }
            }

            if !config_file_found {
                builder = builder
                    .set_default("api.bind_address", "0.0.0.0:8080")?
                    .set_default("api.request_log_capacity", 200)?
                    .set_default("pool.max_concurrent_jobs", 5)?
                    .set_default("pool.monitor_interval_seconds", 1)?
                    .set_default("pool.default_timeout_seconds", 30)?
                    .set_default("agent.port", 7576)?
                    .set_default("agent.ping_timeout_seconds", 2)?
                    .set_default("agent.status_timeout_seconds", 3)?
                    .set_default("cleanup.max_age_hours", 24)?;
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("GRIDX")
                .separator("_")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.bind_address.is_empty() {
            return Err(anyhow::anyhow!("api.bind_address 不能为空"));
        }
        if self.pool.max_concurrent_jobs == 0 {
            return Err(anyhow::anyhow!("pool.max_concurrent_jobs 必须大于0"));
        }
        if self.pool.monitor_interval_seconds == 0 {
            return Err(anyhow::anyhow!("pool.monitor_interval_seconds 必须大于0"));
        }
        let mut seen = std::collections::HashSet::new();
        for peer in &self.workers {
            if peer.name.is_empty() || peer.address.is_empty() {
                return Err(anyhow::anyhow!("workers 条目的 name 和 address 不能为空"));
            }
            if !seen.insert(peer.name.as_str()) {
                return Err(anyhow::anyhow!("Worker名称重复: {}", peer.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.pool.max_concurrent_jobs, 5);
        assert_eq!(config.pool.monitor_interval_seconds, 1);
        assert_eq!(config.agent.port, 7576);
        assert_eq!(config.api.bind_address, "0.0.0.0:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_from_toml() {
        let toml_str = r#"
[api]
bind_address = "0.0.0.0:9000"
request_log_capacity = 100

[pool]
max_concurrent_jobs = 3
monitor_interval_seconds = 1
default_timeout_seconds = 60

[agent]
port = 7576
ping_timeout_seconds = 2
status_timeout_seconds = 3

[cleanup]
max_age_hours = 12

[[workers]]
name = "node-a"
address = "10.0.0.1"
cpus = 8
memory_gb = 32
gpus = 1

[[workers]]
name = "node-b"
address = "10.0.0.2"
"#;

        let config = AppConfig::from_toml(toml_str).expect("Failed to parse TOML");
        assert_eq!(config.api.bind_address, "0.0.0.0:9000");
        assert_eq!(config.pool.max_concurrent_jobs, 3);
        assert_eq!(config.workers.len(), 2);
        assert_eq!(config.workers[0].gpus, 1);
        assert_eq!(config.workers[1].gpus, 0);
    }

    #[test]
    fn test_duplicate_worker_names_rejected() {
        let toml_str = r#"
[api]
bind_address = "0.0.0.0:9000"
request_log_capacity = 100

[pool]
max_concurrent_jobs = 5
monitor_interval_seconds = 1
default_timeout_seconds = 30

[agent]
port = 7576
ping_timeout_seconds = 2
status_timeout_seconds = 3

[cleanup]
max_age_hours = 24

[[workers]]
name = "node-a"
address = "10.0.0.1"

[[workers]]
name = "node-a"
address = "10.0.0.2"
"#;

        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let mut config = AppConfig::default();
        config.pool.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
[api]
bind_address = "127.0.0.1:8088"
request_log_capacity = 50

[pool]
max_concurrent_jobs = 2
monitor_interval_seconds = 1
default_timeout_seconds = 10

[agent]
port = 7576
ping_timeout_seconds = 1
status_timeout_seconds = 2

[cleanup]
max_age_hours = 1
"#
        )
        .expect("write temp config");

        let config =
            AppConfig::load(Some(file.path().to_str().expect("temp path"))).expect("load config");
        assert_eq!(config.api.bind_address, "127.0.0.1:8088");
        assert_eq!(config.pool.max_concurrent_jobs, 2);
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(AppConfig::load(Some("/nonexistent/gridx.toml")).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().expect("serialize");
        let parsed = AppConfig::from_toml(&toml_str).expect("parse back");
        assert_eq!(parsed.pool.max_concurrent_jobs, config.pool.max_concurrent_jobs);
        assert_eq!(parsed.api.bind_address, config.api.bind_address);
    }
}
