use uuid::Uuid;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum GridError {
    #[error("没有可用的Worker节点")]
    NoEligibleWorker,
    #[error("Worker不存在: name={name}")]
    WorkerNotFound { name: String },
    #[error("Worker连接失败: {0}")]
    DispatchConnection(String),
    #[error("远程执行超时: {seconds}秒")]
    DispatchTimeout { seconds: u64 },
    #[error("远程命令退出码非零: {code}: {stderr}")]
    RemoteExit { code: i32, stderr: String },
    #[error("任务不存在: id={id}")]
    JobNotFound { id: Uuid },
    #[error("任务状态转换无效: {0}")]
    InvalidTransition(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("数据序列化错误: {0}")]
    Serialization(String),
    #[error("系统内部错误: {0}")]
    Internal(String),
}

pub type GridResult<T> = Result<T, GridError>;

impl GridError {
    pub fn worker_not_found<S: Into<String>>(name: S) -> Self {
        Self::WorkerNotFound { name: name.into() }
    }
    pub fn job_not_found(id: Uuid) -> Self {
        Self::JobNotFound { id }
    }
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::DispatchConnection(msg.into())
    }
    pub fn invalid_transition<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTransition(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(self, GridError::Internal(_) | GridError::Configuration(_))
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GridError::DispatchConnection(_)
                | GridError::DispatchTimeout { .. }
                | GridError::NoEligibleWorker
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            GridError::NoEligibleWorker => "当前没有在线的Worker节点，请稍后重试",
            GridError::WorkerNotFound { .. } => "请求的Worker节点不存在",
            GridError::JobNotFound { .. } => "请求的任务不存在",
            GridError::InvalidTransition(_) => "任务已结束，无法执行此操作",
            GridError::RemoteExit { .. } => "远程命令执行失败，详见任务错误信息",
            GridError::DispatchTimeout { .. } => "远程执行超时，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for GridError {
    fn from(err: anyhow::Error) -> Self {
        GridError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(GridError::NoEligibleWorker.is_retryable());
        assert!(GridError::connection("refused").is_retryable());
        let exit = GridError::RemoteExit {
            code: 1,
            stderr: "Traceback".to_string(),
        };
        assert!(!exit.is_retryable());
        assert!(!exit.is_fatal());
        assert!(GridError::internal("boom").is_fatal());
        assert!(!GridError::NoEligibleWorker.is_fatal());
    }

    #[test]
    fn test_helper_constructors() {
        let id = Uuid::new_v4();
        match GridError::job_not_found(id) {
            GridError::JobNotFound { id: got } => assert_eq!(got, id),
            _ => panic!("Expected JobNotFound"),
        }
        match GridError::worker_not_found("gpu-01") {
            GridError::WorkerNotFound { name } => assert_eq!(name, "gpu-01"),
            _ => panic!("Expected WorkerNotFound"),
        }
    }

    #[test]
    fn test_display_includes_context() {
        let err = GridError::DispatchTimeout { seconds: 30 };
        assert!(err.to_string().contains("30"));
        let err = GridError::RemoteExit {
            code: 2,
            stderr: "No such file".to_string(),
        };
        assert!(err.to_string().contains('2'));
        assert!(err.to_string().contains("No such file"));
    }
}
