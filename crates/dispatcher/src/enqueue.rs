use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobflow_core::{EnqueueOptions, JobError, JobResult, Message, WorkQueue};
use jobflow_infrastructure::StructuredLogger;
use tracing::debug;

/// 调用方驱动的入队操作
///
/// 不经过领导者检查。失败时带完整上下文记录日志，并把错误返回给调用方。
#[derive(Clone)]
pub struct Enqueuer {
    queue: Arc<dyn WorkQueue>,
}

impl Enqueuer {
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self { queue }
    }

    /// 立即入队，返回工作项的jid
    pub async fn enqueue_now(
        &self,
        queue: &str,
        class: &str,
        args: serde_json::Value,
    ) -> JobResult<String> {
        self.enqueue_with_options(queue, class, args, &EnqueueOptions::default())
            .await
    }

    /// 延迟 `delay` 之后才可被消费
    pub async fn enqueue_after_delay(
        &self,
        queue: &str,
        class: &str,
        args: serde_json::Value,
        delay: Duration,
    ) -> JobResult<String> {
        let timing = format!("in {delay:?}");
        let Some(at) = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
        else {
            let err = JobError::queue(format!("延迟时间超出范围: {delay:?}"));
            StructuredLogger::log_enqueue_failed(queue, class, &args, Some(&timing), &err);
            return Err(err);
        };

        let message = Message::new(queue, class, args).scheduled_at(at);
        self.push(message, Some(timing)).await
    }

    /// 到达 `at` 之后才可被消费
    pub async fn enqueue_at(
        &self,
        queue: &str,
        class: &str,
        args: serde_json::Value,
        at: DateTime<Utc>,
    ) -> JobResult<String> {
        self.push(
            Message::new(queue, class, args).scheduled_at(at),
            Some(format!("at {}", at.to_rfc3339())),
        )
        .await
    }

    pub async fn enqueue_with_options(
        &self,
        queue: &str,
        class: &str,
        args: serde_json::Value,
        options: &EnqueueOptions,
    ) -> JobResult<String> {
        let timing = options.at.map(|at| format!("at {}", at.to_rfc3339()));
        self.push(Message::new(queue, class, args).with_options(options), timing)
            .await
    }

    async fn push(&self, message: Message, timing: Option<String>) -> JobResult<String> {
        let result = match message.at {
            Some(at) => self.queue.push_scheduled(&message, at).await,
            None => self.queue.push(&message).await,
        };

        match result {
            Ok(()) => {
                debug!(
                    "Enqueued job {} to queue '{}' ({})",
                    message.jid,
                    message.queue,
                    timing.as_deref().unwrap_or("now")
                );
                Ok(message.jid)
            }
            Err(e) => {
                StructuredLogger::log_enqueue_failed(
                    &message.queue,
                    &message.class,
                    &message.args,
                    timing.as_deref(),
                    &e,
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobflow_infrastructure::InMemoryWorkQueue;
    use jobflow_testing_utils::FlakyQueue;
    use serde_json::json;

    #[tokio::test]
    async fn test_enqueue_now_is_immediately_visible() {
        let queue = InMemoryWorkQueue::new();
        let enqueuer = Enqueuer::new(Arc::new(queue.clone()));

        let jid = enqueuer
            .enqueue_now("q1", "ClassA", json!({"k": "v"}))
            .await
            .unwrap();

        let items = queue.snapshot("q1").await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].jid, jid);
        assert_eq!(items[0].class, "ClassA");
        assert_eq!(items[0].args, json!({"k": "v"}));
    }

    #[tokio::test]
    async fn test_delayed_enqueue_is_not_delivered_early() {
        let queue = InMemoryWorkQueue::new();
        let enqueuer = Enqueuer::new(Arc::new(queue.clone()));

        enqueuer
            .enqueue_after_delay("q1", "ClassA", json!({}), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(queue.promote_due(Utc::now()).await.unwrap(), 0);
        assert!(queue.fetch("q1", "c1").await.unwrap().is_none());

        let later = Utc::now() + chrono::Duration::seconds(6);
        assert_eq!(queue.promote_due(later).await.unwrap(), 1);
        assert!(queue.fetch("q1", "c1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_enqueue_at_uses_scheduled_set() {
        let queue = InMemoryWorkQueue::new();
        let enqueuer = Enqueuer::new(Arc::new(queue.clone()));
        let at = Utc::now() + chrono::Duration::hours(1);

        enqueuer.enqueue_at("q1", "ClassA", json!([1, 2]), at).await.unwrap();
        assert_eq!(queue.scheduled_size().await.unwrap(), 1);
        assert_eq!(queue.queue_size("q1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_options_are_carried_on_message() {
        let queue = InMemoryWorkQueue::new();
        let enqueuer = Enqueuer::new(Arc::new(queue.clone()));
        let options = EnqueueOptions {
            retry: true,
            retry_max: Some(3),
            at: None,
        };

        enqueuer
            .enqueue_with_options("q1", "ClassA", json!({}), &options)
            .await
            .unwrap();
        let items = queue.snapshot("q1").await;
        assert!(items[0].retry);
        assert_eq!(items[0].retry_max, Some(3));
    }

    #[tokio::test]
    async fn test_failures_are_returned_to_caller() {
        let queue = FlakyQueue::new();
        queue.set_failing(true);
        let enqueuer = Enqueuer::new(Arc::new(queue));

        assert!(matches!(
            enqueuer.enqueue_now("q1", "ClassA", json!({})).await,
            Err(JobError::Queue(_))
        ));
        assert!(enqueuer
            .enqueue_after_delay("q1", "ClassA", json!({}), Duration::from_secs(1))
            .await
            .is_err());
        assert!(enqueuer
            .enqueue_at("q1", "ClassA", json!({}), Utc::now())
            .await
            .is_err());
    }
}
