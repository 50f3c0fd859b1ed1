//! Observability
//!
//! 结构化日志事件与日志系统初始化。指标通过 `metrics` 门面记录，
//! 由嵌入方安装具体的 recorder。

pub mod logging;
pub mod structured_logger;

pub use logging::init_logging;
pub use structured_logger::StructuredLogger;
