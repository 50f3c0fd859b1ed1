use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobflow_core::{Delivery, JobError, JobResult, Message, QueueConfig, RedisConfig, WorkQueue};
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use super::connection_manager::RedisConnectionPool;

const PROMOTE_BATCH_SIZE: usize = 100;

/// 基于Redis列表与有序集合的工作队列
///
/// 处理中列表以消费者标识命名，见 `QueueConfig::process_id`。
pub struct RedisWorkQueue {
    pool: Arc<RedisConnectionPool>,
    namespace: String,
}

impl RedisWorkQueue {
    pub async fn connect(redis: &RedisConfig, config: &QueueConfig) -> JobResult<Self> {
        let pool = RedisConnectionPool::connect(redis, config.pool_size).await?;
        Ok(Self::new(Arc::new(pool), config))
    }

    pub fn new(pool: Arc<RedisConnectionPool>, config: &QueueConfig) -> Self {
        Self {
            pool,
            namespace: config.namespace.clone(),
        }
    }

    fn queues_key(&self) -> String {
        format!("{}queues", self.namespace)
    }

    fn queue_key(&self, queue: &str) -> String {
        format!("{}queue:{}", self.namespace, queue)
    }

    fn in_progress_key(&self, queue: &str, consumer: &str) -> String {
        format!("{}queue:{}:{}:inprogress", self.namespace, queue, consumer)
    }

    fn schedule_key(&self) -> String {
        format!("{}schedule", self.namespace)
    }

    fn retry_key(&self) -> String {
        format!("{}retry", self.namespace)
    }

    fn score(at: DateTime<Utc>) -> f64 {
        at.timestamp_millis() as f64 / 1000.0
    }

    fn queue_error(op: &str, e: redis::RedisError) -> JobError {
        counter!("jobflow_queue_errors_total", "op" => op.to_string()).increment(1);
        JobError::queue(format!("Redis {op} failed: {e}"))
    }

    async fn push_raw(&self, queue: &str, raw: &str) -> JobResult<()> {
        let mut conn = self.pool.get();
        let _: () = redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(self.queues_key())
            .arg(queue)
            .ignore()
            .cmd("LPUSH")
            .arg(self.queue_key(queue))
            .arg(raw)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::queue_error("push", e))?;
        Ok(())
    }

    async fn add_to_sorted_set(
        &self,
        key: String,
        message: &Message,
        at: DateTime<Utc>,
    ) -> JobResult<()> {
        let raw = message.clone().scheduled_at(at).serialize()?;
        let mut conn = self.pool.get();
        let _: () = redis::cmd("ZADD")
            .arg(&key)
            .arg(Self::score(at))
            .arg(raw)
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::queue_error("zadd", e))?;
        debug!(
            "Message {} for queue {} parked in {} until {}",
            message.jid, message.queue, key, at
        );
        Ok(())
    }

    async fn promote_from(&self, key: String, now: DateTime<Utc>) -> JobResult<usize> {
        let mut promoted = 0;
        loop {
            let mut conn = self.pool.get();
            let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
                .arg(&key)
                .arg("-inf")
                .arg(Self::score(now))
                .arg("LIMIT")
                .arg(0)
                .arg(PROMOTE_BATCH_SIZE)
                .query_async(&mut conn)
                .await
                .map_err(|e| Self::queue_error("zrangebyscore", e))?;
            let batch_len = due.len();

            for raw in due {
                // 只有成功移除成员的进程负责推入，避免多个进程重复投递
                let removed: i64 = redis::cmd("ZREM")
                    .arg(&key)
                    .arg(&raw)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| Self::queue_error("zrem", e))?;
                if removed == 0 {
                    continue;
                }

                match Message::deserialize(&raw) {
                    Ok(mut message) => {
                        message.at = None;
                        let ready = message.serialize()?;
                        self.push_raw(&message.queue, &ready).await?;
                        promoted += 1;
                    }
                    Err(e) => {
                        counter!("jobflow_malformed_messages_total").increment(1);
                        warn!("Dropping malformed message from {}: {}", key, e);
                    }
                }
            }

            if batch_len < PROMOTE_BATCH_SIZE {
                break;
            }
        }
        Ok(promoted)
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn push(&self, message: &Message) -> JobResult<()> {
        let start = Instant::now();
        let raw = message.serialize()?;
        self.push_raw(&message.queue, &raw).await?;

        histogram!("jobflow_enqueue_duration_ms").record(start.elapsed().as_millis() as f64);
        counter!("jobflow_enqueued_total", "queue" => message.queue.clone()).increment(1);
        debug!("Pushed message {} to queue {}", message.jid, message.queue);
        Ok(())
    }

    async fn push_scheduled(&self, message: &Message, at: DateTime<Utc>) -> JobResult<()> {
        self.add_to_sorted_set(self.schedule_key(), message, at).await?;
        counter!("jobflow_enqueued_total", "queue" => message.queue.clone()).increment(1);
        Ok(())
    }

    async fn push_retry(&self, message: &Message, at: DateTime<Utc>) -> JobResult<()> {
        self.add_to_sorted_set(self.retry_key(), message, at).await
    }

    async fn fetch(&self, queue: &str, consumer: &str) -> JobResult<Option<Delivery>> {
        let mut conn = self.pool.get();
        let in_progress = self.in_progress_key(queue, consumer);
        let raw: Option<String> = redis::cmd("RPOPLPUSH")
            .arg(self.queue_key(queue))
            .arg(&in_progress)
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::queue_error("fetch", e))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match Message::deserialize(&raw) {
            Ok(message) => Ok(Some(Delivery {
                message,
                raw,
                consumer: consumer.to_string(),
            })),
            Err(e) => {
                counter!("jobflow_malformed_messages_total").increment(1);
                warn!("Dropping malformed message from queue {}: {}", queue, e);
                let _: i64 = redis::cmd("LREM")
                    .arg(&in_progress)
                    .arg(-1)
                    .arg(&raw)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| Self::queue_error("lrem", e))?;
                Ok(None)
            }
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) -> JobResult<()> {
        let mut conn = self.pool.get();
        let removed: i64 = redis::cmd("LREM")
            .arg(self.in_progress_key(&delivery.message.queue, &delivery.consumer))
            .arg(-1)
            .arg(&delivery.raw)
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::queue_error("ack", e))?;

        if removed == 0 {
            warn!(
                "Message {} was not in the in-progress list of queue {} (consumer {})",
                delivery.message.jid, delivery.message.queue, delivery.consumer
            );
        }
        Ok(())
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> JobResult<usize> {
        let scheduled = self.promote_from(self.schedule_key(), now).await?;
        let retried = self.promote_from(self.retry_key(), now).await?;
        let total = scheduled + retried;
        if total > 0 {
            counter!("jobflow_scheduled_promoted_total").increment(total as u64);
            debug!(
                "Promoted {} scheduled and {} retry messages",
                scheduled, retried
            );
        }
        Ok(total)
    }

    async fn requeue_in_flight(&self, queue: &str, consumer: &str) -> JobResult<usize> {
        let mut conn = self.pool.get();
        let in_progress = self.in_progress_key(queue, consumer);
        let ready = self.queue_key(queue);
        let mut recovered = 0;

        loop {
            let moved: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(&in_progress)
                .arg(&ready)
                .query_async(&mut conn)
                .await
                .map_err(|e| Self::queue_error("requeue", e))?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            info!(
                "Recovered {} in-flight messages for queue {} (consumer {})",
                recovered, queue, consumer
            );
        }
        Ok(recovered)
    }

    async fn queue_size(&self, queue: &str) -> JobResult<u64> {
        let mut conn = self.pool.get();
        redis::cmd("LLEN")
            .arg(self.queue_key(queue))
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::queue_error("llen", e))
    }

    async fn scheduled_size(&self) -> JobResult<u64> {
        let mut conn = self.pool.get();
        redis::cmd("ZCARD")
            .arg(self.schedule_key())
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::queue_error("zcard", e))
    }

    async fn retry_size(&self) -> JobResult<u64> {
        let mut conn = self.pool.get();
        redis::cmd("ZCARD")
            .arg(self.retry_key())
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::queue_error("zcard", e))
    }
}
