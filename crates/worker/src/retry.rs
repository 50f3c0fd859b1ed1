use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use jobflow_core::{JobError, JobResult, Message, Middleware, Next, WorkQueue};
use jobflow_infrastructure::StructuredLogger;
use rand::Rng;

/// 失败重试中间件
///
/// 对设置了 `retry` 的消息，失败后按退避时间放入重试集合；
/// 无论是否安排重试，都把原始结果返回给外层。
pub struct RetryMiddleware {
    queue: Arc<dyn WorkQueue>,
}

impl RetryMiddleware {
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self { queue }
    }

    async fn schedule_retry(&self, message: &Message, error: &str) {
        let failed = message.record_failure(error, Utc::now());
        if failed.is_retry_exhausted() {
            StructuredLogger::log_job_retries_exhausted(&failed);
            return;
        }

        let backoff = retry_backoff(failed.retry_count);
        let Some(retry_at) = retry_time(Utc::now(), backoff) else {
            let err = JobError::Internal(format!(
                "message {} retry #{} backoff of {}s is out of range",
                failed.jid, failed.retry_count, backoff
            ));
            StructuredLogger::log_system_error("retry", "schedule_retry", &err);
            return;
        };
        match self.queue.push_retry(&failed, retry_at).await {
            Ok(()) => StructuredLogger::log_job_retry_scheduled(&failed, retry_at),
            Err(e) => StructuredLogger::log_system_error("retry", "push_retry", &e),
        }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn call(&self, queue: &str, message: &Message, next: Next<'_>) -> JobResult<()> {
        let result = next.run(queue, message).await;
        if let Err(e) = &result {
            if message.retry {
                self.schedule_retry(message, &e.to_string()).await;
            }
        }
        result
    }
}

/// 第 `count` 次重试前的等待秒数：`count^4 + 15 + rand(0..30) * (count + 1)`，溢出时取 `u64::MAX`
pub fn retry_backoff(count: u32) -> u64 {
    let count = u64::from(count);
    let jitter: u64 = rand::rng().random_range(0..30);
    count
        .saturating_pow(4)
        .saturating_add(15)
        .saturating_add(jitter.saturating_mul(count + 1))
}

fn retry_time(now: DateTime<Utc>, backoff_secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(backoff_secs).ok()?;
    now.checked_add_signed(TimeDelta::try_seconds(secs)?)
}
