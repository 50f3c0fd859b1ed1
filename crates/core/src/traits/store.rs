use std::time::Duration;

use async_trait::async_trait;

use crate::JobResult;

/// 共享键值存储
///
/// 所有进程共享同一个实例，单个键的当前值对任何进程的读取都是一致的。
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// 写入键值，`ttl` 为 `None` 表示永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> JobResult<()>;

    /// 读取键值，键不存在时返回 `Ok(None)`
    async fn get(&self, key: &str) -> JobResult<Option<String>>;
}
