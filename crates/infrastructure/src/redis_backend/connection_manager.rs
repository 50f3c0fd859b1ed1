use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jobflow_core::{JobError, JobResult, RedisConfig};
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

/// 轮询分配的Redis连接池
///
/// 每个连接都是自动重连的多路复用连接，池大小决定同时在途的命令管线数。
pub struct RedisConnectionPool {
    connections: Vec<ConnectionManager>,
    next: AtomicUsize,
    config: RedisConfig,
}

impl RedisConnectionPool {
    pub async fn connect(config: &RedisConfig, size: usize) -> JobResult<Self> {
        let client = Client::open(config.build_url())
            .map_err(|e| JobError::store(format!("Failed to create Redis client: {e}")))?;

        let mut connections = Vec::with_capacity(size.max(1));
        for _ in 0..size.max(1) {
            connections.push(Self::connect_with_retry(&client, config).await?);
        }

        let pool = Self {
            connections,
            next: AtomicUsize::new(0),
            config: config.clone(),
        };
        pool.ping().await?;
        debug!(
            "Successfully connected to Redis at {}:{}/{} with {} connections",
            config.host,
            config.port,
            config.database,
            pool.connections.len()
        );

        Ok(pool)
    }

    async fn connect_with_retry(
        client: &Client,
        config: &RedisConfig,
    ) -> JobResult<ConnectionManager> {
        let connect_timeout = Duration::from_secs(config.connection_timeout_seconds);
        let mut last_error = String::from("Unknown");

        for attempt in 0..config.max_retry_attempts {
            match timeout(connect_timeout, ConnectionManager::new(client.clone())).await {
                Ok(Ok(conn)) => {
                    if attempt > 0 {
                        debug!(
                            "Successfully connected to Redis after {} attempts",
                            attempt + 1
                        );
                    }
                    return Ok(conn);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("timed out after {connect_timeout:?}"),
            }

            if attempt + 1 < config.max_retry_attempts {
                warn!(
                    "Failed to connect to Redis (attempt {}/{}): {}. Retrying in {}s...",
                    attempt + 1,
                    config.max_retry_attempts,
                    last_error,
                    config.retry_delay_seconds
                );
                sleep(Duration::from_secs(config.retry_delay_seconds)).await;
            }
        }

        let error_msg = format!(
            "Failed to connect to Redis after {} attempts. Last error: {}",
            config.max_retry_attempts, last_error
        );
        error!("{}", error_msg);
        Err(JobError::store(error_msg))
    }

    /// 取下一个连接
    pub fn get(&self) -> ConnectionManager {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[index].clone()
    }

    pub fn size(&self) -> usize {
        self.connections.len()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    pub async fn ping(&self) -> JobResult<()> {
        let mut conn = self.get();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| JobError::store(format!("Redis PING failed: {e}")))?;
        if response == "PONG" {
            Ok(())
        } else {
            Err(JobError::store(format!(
                "Unexpected PING response: {response}"
            )))
        }
    }
}
