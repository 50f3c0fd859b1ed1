use std::sync::Arc;

use jobflow_core::{AppConfig, Backend, JobResult, SharedStore, WorkQueue};
use tracing::info;

use crate::in_memory_queue::InMemoryWorkQueue;
use crate::in_memory_store::InMemorySharedStore;
use crate::redis_backend::{RedisSharedStore, RedisWorkQueue};

/// 按配置创建共享存储与工作队列
pub struct BackendFactory;

impl BackendFactory {
    pub async fn create_store(config: &AppConfig) -> JobResult<Arc<dyn SharedStore>> {
        match config.backend {
            Backend::Redis => {
                info!(
                    "Connecting shared store to Redis at {}:{}/{}",
                    config.store.host, config.store.port, config.store.database
                );
                Ok(Arc::new(RedisSharedStore::connect(&config.store).await?))
            }
            Backend::Memory => {
                info!("Using in-memory shared store");
                Ok(Arc::new(InMemorySharedStore::new()))
            }
        }
    }

    pub async fn create_queue(config: &AppConfig) -> JobResult<Arc<dyn WorkQueue>> {
        match config.backend {
            Backend::Redis => {
                let redis = config.queue_redis();
                info!(
                    "Connecting work queue to Redis at {}:{}/{} (pool: {}, process: {})",
                    redis.host,
                    redis.port,
                    redis.database,
                    config.queue.pool_size,
                    config.queue.process_id
                );
                Ok(Arc::new(
                    RedisWorkQueue::connect(&redis, &config.queue).await?,
                ))
            }
            Backend::Memory => {
                info!("Using in-memory work queue");
                Ok(Arc::new(InMemoryWorkQueue::new()))
            }
        }
    }
}
