use thiserror::Error;

/// 任务调度子系统的错误类型
#[derive(Debug, Error)]
pub enum JobError {
    #[error("共享存储错误: {0}")]
    Store(String),

    #[error("工作队列错误: {0}")]
    Queue(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("任务重复注册: {name}")]
    DuplicateJob { name: String },

    #[error("无效的并发数: 任务 {name} 并发数 {concurrency}")]
    InvalidConcurrency { name: String, concurrency: usize },

    #[error("任务执行失败: {0}")]
    HandlerFailed(String),

    #[error("任务执行时发生panic: {0}")]
    HandlerPanicked(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type JobResult<T> = std::result::Result<T, JobError>;

impl JobError {
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }
    pub fn queue<S: Into<String>>(msg: S) -> Self {
        Self::Queue(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn handler_failed<S: Into<String>>(msg: S) -> Self {
        Self::HandlerFailed(msg.into())
    }
    pub fn invalid_cron<E: Into<String>, M: Into<String>>(expr: E, message: M) -> Self {
        Self::InvalidCron {
            expr: expr.into(),
            message: message.into(),
        }
    }

    /// 启动阶段的注册类错误，出现时进程不应继续提供服务
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JobError::Configuration(_)
                | JobError::InvalidCron { .. }
                | JobError::DuplicateJob { .. }
                | JobError::InvalidConcurrency { .. }
                | JobError::Internal(_)
        )
    }

    /// 与外部协作方通信失败，由调用方决定是否重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobError::Store(_) | JobError::Queue(_) | JobError::Timeout(_)
        )
    }

    /// 处理函数本身的失败（返回错误或panic）
    pub fn is_handler_failure(&self) -> bool {
        matches!(
            self,
            JobError::HandlerFailed(_) | JobError::HandlerPanicked(_)
        )
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        JobError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        JobError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(JobError::invalid_cron("bad", "parse error").is_fatal());
        assert!(JobError::DuplicateJob {
            name: "ping".to_string()
        }
        .is_fatal());
        assert!(!JobError::queue("connection refused").is_fatal());

        assert!(JobError::store("timeout").is_retryable());
        assert!(JobError::queue("broken pipe").is_retryable());
        assert!(!JobError::config_error("missing host").is_retryable());

        assert!(JobError::handler_failed("boom").is_handler_failure());
        assert!(JobError::HandlerPanicked("boom".to_string()).is_handler_failure());
        assert!(!JobError::queue("x").is_handler_failure());
    }

    #[test]
    fn test_error_display() {
        let err = JobError::invalid_cron("* *", "too few fields");
        assert_eq!(err.to_string(), "无效的CRON表达式: * * - too few fields");

        let err = JobError::InvalidConcurrency {
            name: "ping".to_string(),
            concurrency: 0,
        };
        assert!(err.to_string().contains("ping"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: JobError = parse_err.into();
        assert!(matches!(err, JobError::Serialization(_)));
    }
}
