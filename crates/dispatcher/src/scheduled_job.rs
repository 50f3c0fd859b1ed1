use jobflow_core::{EnqueueOptions, JobDefinition, ProcessIdentity};
use jobflow_infrastructure::StructuredLogger;
use metrics::counter;

use crate::enqueue::Enqueuer;
use crate::leader::LeaderGate;

/// 定时器每次触发时执行的动作
///
/// 只有领导者进程会入队；入队失败只记录日志，不影响下一次触发。
pub struct ScheduledJob {
    name: String,
    class: String,
    args: serde_json::Value,
    options: EnqueueOptions,
    identity: ProcessIdentity,
    gate: LeaderGate,
    enqueuer: Enqueuer,
}

impl ScheduledJob {
    pub fn new(
        job: &JobDefinition,
        identity: ProcessIdentity,
        gate: LeaderGate,
        enqueuer: Enqueuer,
    ) -> Self {
        Self {
            name: job.name.clone(),
            class: job.class.clone(),
            args: job.args.clone(),
            options: EnqueueOptions {
                at: None,
                ..job.options.clone()
            },
            identity,
            gate,
            enqueuer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 执行一次触发，返回是否成功入队
    pub async fn run(&self) -> bool {
        if !self.gate.is_leader(&self.identity).await {
            StructuredLogger::log_scheduled_job_skipped(&self.name, self.identity.as_str());
            counter!(
                "jobflow_scheduled_triggers_total",
                "job" => self.name.clone(),
                "outcome" => "skipped"
            )
            .increment(1);
            return false;
        }

        StructuredLogger::log_scheduled_job_enqueued(&self.name, &self.class, &self.args);
        let enqueued = self
            .enqueuer
            .enqueue_with_options(&self.name, &self.class, self.args.clone(), &self.options)
            .await
            .is_ok();

        let outcome = if enqueued { "enqueued" } else { "failed" };
        counter!(
            "jobflow_scheduled_triggers_total",
            "job" => self.name.clone(),
            "outcome" => outcome
        )
        .increment(1);
        enqueued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobflow_core::{handler_fn, SharedStore, WorkQueue};
    use jobflow_infrastructure::{InMemorySharedStore, InMemoryWorkQueue};
    use jobflow_testing_utils::FlakyQueue;
    use serde_json::json;
    use std::sync::Arc;

    const KEY: &str = "active_node:cron";

    fn ping_job() -> JobDefinition {
        JobDefinition::new("ping", handler_fn(|_msg| async { Ok(()) }))
            .with_class("PingJob")
            .with_args(json!({"foo": "bar"}))
            .with_retry(true)
    }

    #[tokio::test]
    async fn test_leader_enqueues_configured_class_and_args() {
        let store = Arc::new(InMemorySharedStore::new());
        let queue = InMemoryWorkQueue::new();
        store.set(KEY, "p1", None).await.unwrap();

        let job = ScheduledJob::new(
            &ping_job(),
            ProcessIdentity::from("p1"),
            LeaderGate::new(store, KEY),
            Enqueuer::new(Arc::new(queue.clone())),
        );
        assert!(job.run().await);

        let items = queue.snapshot("ping").await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].class, "PingJob");
        assert_eq!(items[0].args, json!({"foo": "bar"}));
        assert!(items[0].retry);
    }

    #[tokio::test]
    async fn test_follower_does_nothing() {
        let store = Arc::new(InMemorySharedStore::new());
        let queue = InMemoryWorkQueue::new();
        store.set(KEY, "p2", None).await.unwrap();

        let job = ScheduledJob::new(
            &ping_job(),
            ProcessIdentity::from("p1"),
            LeaderGate::new(store, KEY),
            Enqueuer::new(Arc::new(queue.clone())),
        );
        assert!(!job.run().await);
        assert_eq!(queue.queue_size("ping").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_swallowed_and_next_run_recovers() {
        let store = Arc::new(InMemorySharedStore::new());
        store.set(KEY, "p1", None).await.unwrap();
        let queue = FlakyQueue::new();
        queue.set_failing(true);

        let job = ScheduledJob::new(
            &ping_job(),
            ProcessIdentity::from("p1"),
            LeaderGate::new(store, KEY),
            Enqueuer::new(Arc::new(queue.clone())),
        );
        assert!(!job.run().await);

        queue.set_failing(false);
        assert!(job.run().await);
        assert_eq!(queue.inner().queue_size("ping").await.unwrap(), 1);
    }
}
