//! Test doubles for the scheduler collaborators

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobflow_core::{
    CronTrigger, Delivery, JobError, JobResult, Message, SharedStore, TriggerCallback, WorkQueue,
};
use jobflow_infrastructure::{InMemorySharedStore, InMemoryWorkQueue};

/// 不依赖时间的定时器，测试中通过 [`ManualTrigger::fire_all`] 触发
#[derive(Clone, Default)]
pub struct ManualTrigger {
    entries: Arc<Mutex<Vec<(String, TriggerCallback)>>>,
    stopped: Arc<AtomicBool>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expressions(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(expr, _)| expr.clone())
            .collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// 依次触发所有已登记的回调
    pub async fn fire_all(&self) {
        let callbacks: Vec<TriggerCallback> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback().await;
        }
    }
}

impl CronTrigger for ManualTrigger {
    fn schedule(&self, expression: &str, callback: TriggerCallback) -> JobResult<()> {
        if self.is_stopped() {
            return Err(JobError::Internal("trigger stopped".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .push((expression.to_string(), callback));
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.entries.lock().unwrap().clear();
    }
}

/// 可随时切换为失败的共享存储
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: InMemorySharedStore,
    failing: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrapping(inner: InMemorySharedStore) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> JobResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(JobError::store("store unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SharedStore for FlakyStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> JobResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> JobResult<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }
}

/// 可随时切换为失败的工作队列，底层为 [`InMemoryWorkQueue`]
#[derive(Clone, Default)]
pub struct FlakyQueue {
    inner: InMemoryWorkQueue,
    failing: Arc<AtomicBool>,
}

impl FlakyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryWorkQueue {
        &self.inner
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> JobResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(JobError::queue("queue unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WorkQueue for FlakyQueue {
    async fn push(&self, message: &Message) -> JobResult<()> {
        self.check()?;
        self.inner.push(message).await
    }

    async fn push_scheduled(&self, message: &Message, at: DateTime<Utc>) -> JobResult<()> {
        self.check()?;
        self.inner.push_scheduled(message, at).await
    }

    async fn push_retry(&self, message: &Message, at: DateTime<Utc>) -> JobResult<()> {
        self.check()?;
        self.inner.push_retry(message, at).await
    }

    async fn fetch(&self, queue: &str, consumer: &str) -> JobResult<Option<Delivery>> {
        self.check()?;
        self.inner.fetch(queue, consumer).await
    }

    async fn acknowledge(&self, delivery: &Delivery) -> JobResult<()> {
        self.check()?;
        self.inner.acknowledge(delivery).await
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> JobResult<usize> {
        self.check()?;
        self.inner.promote_due(now).await
    }

    async fn requeue_in_flight(&self, queue: &str, consumer: &str) -> JobResult<usize> {
        self.check()?;
        self.inner.requeue_in_flight(queue, consumer).await
    }

    async fn queue_size(&self, queue: &str) -> JobResult<u64> {
        self.check()?;
        self.inner.queue_size(queue).await
    }

    async fn scheduled_size(&self) -> JobResult<u64> {
        self.check()?;
        self.inner.scheduled_size().await
    }

    async fn retry_size(&self) -> JobResult<u64> {
        self.check()?;
        self.inner.retry_size().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_manual_trigger_fires_registered_callbacks() {
        let trigger = ManualTrigger::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let callback: TriggerCallback = Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });

        trigger.schedule("@every 1s", callback).unwrap();
        trigger.fire_all().await;
        trigger.fire_all().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(trigger.expressions(), vec!["@every 1s".to_string()]);

        trigger.stop();
        trigger.fire_all().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_flaky_store_toggles() {
        let store = FlakyStore::new();
        store.set("k", "v", None).await.unwrap();
        store.set_failing(true);
        assert!(store.get("k").await.is_err());
        store.set_failing(false);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
