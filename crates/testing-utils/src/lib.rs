//! # Jobflow Testing Utils
//!
//! 工作区内各crate共用的测试替身与辅助工具：
//!
//! - **Mocks**: 手动触发的定时器、可切换失败的存储与队列
//! - **Builders**: 测试用配置、上下文与记录型任务
//! - **Events**: 捕获结构化日志事件的 `tracing` layer
//! - **Helpers**: 异步等待等常用模式
//!
//! ```toml
//! [dev-dependencies]
//! jobflow-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod events;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use events::*;
pub use helpers::*;
pub use mocks::*;
