pub mod config;
pub mod errors;
pub mod logging;

pub use config::{AgentConfig, ApiConfig, AppConfig, CleanupConfig, PoolConfig, WorkerPeerConfig};
pub use errors::{GridError, GridResult};
