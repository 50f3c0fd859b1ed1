use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobflow_core::{JobResult, SharedStore};
use tokio::sync::RwLock;
use tokio::time::Instant;

/// 内存共享存储
///
/// 克隆出的实例共享同一份数据，可以模拟多个进程连接同一个存储。
#[derive(Debug, Clone, Default)]
pub struct InMemorySharedStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl InMemorySharedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStore for InMemorySharedStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> JobResult<()> {
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| Instant::now() + ttl);
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> JobResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at.map_or(true, |at| Instant::now() < at))
            .map(|entry| entry.value.clone()))
    }
}
