use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobflow_core::{JobError, JobResult, RedisConfig, SharedStore};
use tracing::debug;

use super::connection_manager::RedisConnectionPool;

/// 基于Redis的共享存储
pub struct RedisSharedStore {
    pool: Arc<RedisConnectionPool>,
}

impl RedisSharedStore {
    pub async fn connect(config: &RedisConfig) -> JobResult<Self> {
        let pool = RedisConnectionPool::connect(config, 1).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    pub fn new(pool: Arc<RedisConnectionPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SharedStore for RedisSharedStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> JobResult<()> {
        let mut conn = self.pool.get();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }

        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| JobError::store(format!("Redis SET {key} failed: {e}")))?;
        debug!("Stored key {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> JobResult<Option<String>> {
        let mut conn = self.pool.get();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| JobError::store(format!("Redis GET {key} failed: {e}")))
    }
}
