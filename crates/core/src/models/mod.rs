//! # 数据模型
//!
//! - [`Message`]：工作队列中流转的一次工作项
//! - [`JobDefinition`]：一类任务的定义（队列名、处理函数、并发数、定时表达式等）
//! - [`ProcessIdentity`]：进程生命周期内唯一的随机标识，用于与领导者键比较
//!
//! 所有时间字段使用 `DateTime<Utc>`。

pub mod identity;
pub mod job;
pub mod message;

pub use identity::*;
pub use job::*;
pub use message::*;
