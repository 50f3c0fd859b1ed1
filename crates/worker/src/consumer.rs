use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobflow_core::{
    Delivery, JobError, JobHandler, JobResult, Message, Middleware, ProcessIdentity, QueueConfig,
    WorkQueue,
};
use jobflow_infrastructure::StructuredLogger;
use tokio::sync::{broadcast, Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::middleware::{default_middlewares, MiddlewareChain};

/// 消费者运行参数
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// 就绪队列为空时的等待间隔，同时也是延迟集合的轮询间隔
    pub poll_interval: Duration,
    /// 停止时等待处理中任务完成的最长时间
    pub shutdown_timeout: Duration,
    /// 处理中列表的归属，同一时刻只能有一个管理器使用
    pub consumer_id: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            shutdown_timeout: Duration::from_secs(30),
            consumer_id: ProcessIdentity::generate().to_string(),
        }
    }
}

impl From<&QueueConfig> for ConsumerConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_seconds),
            consumer_id: config.process_id.clone(),
        }
    }
}

struct QueueConsumer {
    chain: MiddlewareChain,
    concurrency: usize,
    permits: Arc<Semaphore>,
}

/// 按队列管理消费者
///
/// 每个注册的队列对应一个拉取循环，同时在途的调用数不超过注册时给定的并发数。
pub struct ConsumerManager {
    queue: Arc<dyn WorkQueue>,
    config: ConsumerConfig,
    defaults: Vec<Arc<dyn Middleware>>,
    consumers: RwLock<BTreeMap<String, Arc<QueueConsumer>>>,
    shutdown_tx: RwLock<Option<broadcast::Sender<()>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ConsumerManager {
    pub fn new(queue: Arc<dyn WorkQueue>, config: ConsumerConfig) -> Self {
        let defaults = default_middlewares(queue.clone());
        Self {
            queue,
            config,
            defaults,
            consumers: RwLock::new(BTreeMap::new()),
            shutdown_tx: RwLock::new(None),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// 注册一个队列的处理函数
    pub async fn register(
        &self,
        name: &str,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        middlewares: &[Arc<dyn Middleware>],
    ) -> JobResult<()> {
        if concurrency == 0 {
            return Err(JobError::InvalidConcurrency {
                name: name.to_string(),
                concurrency,
            });
        }
        if self.is_running().await {
            return Err(JobError::Internal(format!(
                "消费者已启动，无法再注册队列 {name}"
            )));
        }

        let mut consumers = self.consumers.write().await;
        if consumers.contains_key(name) {
            return Err(JobError::DuplicateJob {
                name: name.to_string(),
            });
        }

        let chain = MiddlewareChain::build(&self.defaults, middlewares, handler);
        consumers.insert(
            name.to_string(),
            Arc::new(QueueConsumer {
                chain,
                concurrency,
                permits: Arc::new(Semaphore::new(concurrency)),
            }),
        );
        debug!("Registered consumer for queue '{}' with concurrency {}", name, concurrency);
        Ok(())
    }

    pub async fn registered_queues(&self) -> Vec<String> {
        self.consumers.read().await.keys().cloned().collect()
    }

    pub fn consumer_id(&self) -> &str {
        &self.config.consumer_id
    }

    pub async fn is_running(&self) -> bool {
        self.shutdown_tx.read().await.is_some()
    }

    /// 在当前任务中直接调用某个队列的完整中间件链
    pub async fn invoke(&self, queue: &str, message: &Message) -> JobResult<()> {
        let consumer = self
            .consumers
            .read()
            .await
            .get(queue)
            .cloned()
            .ok_or_else(|| JobError::Internal(format!("队列 {queue} 没有注册消费者")))?;
        consumer.chain.invoke(queue, message).await
    }

    /// 启动所有拉取循环和延迟集合轮询，立即返回
    pub async fn run(&self) -> JobResult<()> {
        let mut shutdown_slot = self.shutdown_tx.write().await;
        if shutdown_slot.is_some() {
            return Err(JobError::Internal("消费者已在运行".to_string()));
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let consumers = self.consumers.read().await;
        let mut handles = self.handles.lock().await;

        for (name, consumer) in consumers.iter() {
            handles.push(tokio::spawn(consume_loop(
                self.queue.clone(),
                name.clone(),
                self.config.consumer_id.clone(),
                consumer.clone(),
                self.config.poll_interval,
                shutdown_tx.subscribe(),
            )));
        }
        handles.push(tokio::spawn(poll_scheduled(
            self.queue.clone(),
            self.config.poll_interval,
            shutdown_tx.subscribe(),
        )));

        info!(
            "Started consumers for {} queue(s) as '{}'",
            consumers.len(),
            self.config.consumer_id
        );
        *shutdown_slot = Some(shutdown_tx);
        Ok(())
    }

    /// 停止拉取，并在超时时间内等待处理中的任务结束
    pub async fn stop(&self) -> JobResult<()> {
        let Some(shutdown_tx) = self.shutdown_tx.write().await.take() else {
            return Ok(());
        };
        let _ = shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Consumer loop terminated abnormally: {}", e);
            }
        }

        let consumers: Vec<(String, Arc<QueueConsumer>)> = self
            .consumers
            .read()
            .await
            .iter()
            .map(|(name, consumer)| (name.clone(), consumer.clone()))
            .collect();
        let drain = async {
            for (name, consumer) in &consumers {
                match consumer.permits.acquire_many(consumer.concurrency as u32).await {
                    Ok(permits) => drop(permits),
                    Err(_) => warn!("Permit pool for queue '{}' closed", name),
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain)
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs did not finish within {:?}, they will be recovered on next start",
                self.config.shutdown_timeout
            );
        }

        info!("Consumers stopped");
        Ok(())
    }
}

async fn consume_loop(
    queue: Arc<dyn WorkQueue>,
    name: String,
    consumer_id: String,
    consumer: Arc<QueueConsumer>,
    poll_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    match queue.requeue_in_flight(&name, &consumer_id).await {
        Ok(0) => {}
        Ok(count) => info!("Recovered {} in-flight message(s) for queue '{}'", count, name),
        Err(e) => StructuredLogger::log_system_error("consumer", "requeue_in_flight", &e),
    }

    loop {
        let permit = tokio::select! {
            permit = consumer.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown_rx.recv() => break,
        };

        let idle = match queue.fetch(&name, &consumer_id).await {
            Ok(Some(delivery)) => {
                let queue = queue.clone();
                let consumer = consumer.clone();
                let name = name.clone();
                tokio::spawn(async move {
                    process(queue.as_ref(), &name, &consumer, delivery).await;
                    drop(permit);
                });
                false
            }
            Ok(None) => true,
            Err(e) => {
                StructuredLogger::log_system_error("consumer", "fetch", &e);
                true
            }
        };

        if idle {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown_rx.recv() => break,
            }
        }
    }
    debug!("Consumer loop for queue '{}' exited", name);
}

async fn process(queue: &dyn WorkQueue, name: &str, consumer: &QueueConsumer, delivery: Delivery) {
    // 失败的消息已由重试中间件另行安排，这里一律确认
    let _ = consumer.chain.invoke(name, &delivery.message).await;
    if let Err(e) = queue.acknowledge(&delivery).await {
        StructuredLogger::log_system_error("consumer", "acknowledge", &e);
    }
}

async fn poll_scheduled(
    queue: Arc<dyn WorkQueue>,
    poll_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match queue.promote_due(Utc::now()).await {
                    Ok(0) => {}
                    Ok(count) => debug!("Promoted {} due message(s)", count),
                    Err(e) => StructuredLogger::log_system_error("consumer", "promote_due", &e),
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobflow_core::handler_fn;
    use jobflow_infrastructure::InMemoryWorkQueue;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> ConsumerConfig {
        ConsumerConfig {
            poll_interval: Duration::from_millis(10),
            shutdown_timeout: Duration::from_secs(5),
            ..ConsumerConfig::default()
        }
    }

    async fn wait_until<F: Fn() -> bool>(check: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_zero_concurrency() {
        let manager = ConsumerManager::new(Arc::new(InMemoryWorkQueue::new()), fast_config());
        let handler = handler_fn(|_msg| async { Ok(()) });

        manager.register("a", handler.clone(), 1, &[]).await.unwrap();
        assert!(matches!(
            manager.register("a", handler.clone(), 1, &[]).await,
            Err(JobError::DuplicateJob { .. })
        ));
        assert!(matches!(
            manager.register("b", handler, 0, &[]).await,
            Err(JobError::InvalidConcurrency { .. })
        ));
        assert_eq!(manager.registered_queues().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_invoke_unknown_queue_fails() {
        let manager = ConsumerManager::new(Arc::new(InMemoryWorkQueue::new()), fast_config());
        let message = Message::new("missing", "X", json!({}));
        assert!(manager.invoke("missing", &message).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_messages_are_processed_and_acknowledged() {
        let queue = InMemoryWorkQueue::new();
        let manager = ConsumerManager::new(Arc::new(queue.clone()), fast_config());
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = processed.clone();
        let handler = handler_fn(move |_msg| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        manager.register("emails", handler, 2, &[]).await.unwrap();

        for i in 0..3 {
            queue
                .push(&Message::new("emails", "Email", json!({ "n": i })))
                .await
                .unwrap();
        }
        manager.run().await.unwrap();

        wait_until(|| processed.load(Ordering::SeqCst) == 3).await;
        manager.stop().await.unwrap();

        assert_eq!(queue.queue_size("emails").await.unwrap(), 0);
        assert_eq!(queue.in_flight_size("emails").await, 0);
        assert!(!manager.is_running().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_limit_is_respected() {
        let queue = InMemoryWorkQueue::new();
        let manager = ConsumerManager::new(Arc::new(queue.clone()), fast_config());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let (a, p, d) = (active.clone(), peak.clone(), done.clone());
        let handler = handler_fn(move |_msg| {
            let (active, peak, done) = (a.clone(), p.clone(), d.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        manager.register("reports", handler, 2, &[]).await.unwrap();

        for _ in 0..6 {
            queue
                .push(&Message::new("reports", "Report", json!({})))
                .await
                .unwrap();
        }
        manager.run().await.unwrap();
        wait_until(|| done.load(Ordering::SeqCst) == 6).await;
        manager.stop().await.unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_handler_does_not_stop_consumer() {
        let queue = InMemoryWorkQueue::new();
        let manager = ConsumerManager::new(Arc::new(queue.clone()), fast_config());
        let ok = Arc::new(AtomicUsize::new(0));
        let counter = ok.clone();
        let handler = handler_fn(move |msg: Message| {
            let counter = counter.clone();
            async move {
                if msg.args["explode"] == json!(true) {
                    panic!("kaboom");
                }
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        manager.register("risky", handler, 1, &[]).await.unwrap();

        queue
            .push(&Message::new("risky", "Risky", json!({"explode": true})))
            .await
            .unwrap();
        queue
            .push(&Message::new("risky", "Risky", json!({"explode": false})))
            .await
            .unwrap();
        manager.run().await.unwrap();

        wait_until(|| ok.load(Ordering::SeqCst) == 1).await;
        manager.stop().await.unwrap();
        assert_eq!(queue.in_flight_size("risky").await, 0);
    }

    #[test]
    fn test_consumer_id_follows_queue_config() {
        let queue_config = QueueConfig {
            process_id: "node-a:42".to_string(),
            ..QueueConfig::default()
        };
        assert_eq!(ConsumerConfig::from(&queue_config).consumer_id, "node-a:42");
        assert_ne!(
            ConsumerConfig::default().consumer_id,
            ConsumerConfig::default().consumer_id
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_starting_consumer_does_not_steal_live_in_flight() {
        let queue = InMemoryWorkQueue::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let slow_handler = |runs: Arc<AtomicUsize>, done: Arc<AtomicUsize>| {
            handler_fn(move |_msg| {
                let (runs, done) = (runs.clone(), done.clone());
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        let first = ConsumerManager::new(Arc::new(queue.clone()), fast_config());
        let second = ConsumerManager::new(Arc::new(queue.clone()), fast_config());
        first
            .register("slow", slow_handler(runs.clone(), done.clone()), 1, &[])
            .await
            .unwrap();
        second
            .register("slow", slow_handler(runs.clone(), done.clone()), 1, &[])
            .await
            .unwrap();

        queue
            .push(&Message::new("slow", "Slow", json!({})))
            .await
            .unwrap();
        first.run().await.unwrap();
        wait_until(|| runs.load(Ordering::SeqCst) == 1).await;

        second.run().await.unwrap();
        wait_until(|| done.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        first.stop().await.unwrap();
        second.stop().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(queue.queue_size("slow").await.unwrap(), 0);
        assert_eq!(queue.in_flight_size("slow").await, 0);
    }

    #[tokio::test]
    async fn test_register_after_run_is_rejected() {
        let manager = ConsumerManager::new(Arc::new(InMemoryWorkQueue::new()), fast_config());
        manager.run().await.unwrap();
        let handler = handler_fn(|_msg| async { Ok(()) });
        assert!(manager.register("late", handler, 1, &[]).await.is_err());
        assert!(manager.run().await.is_err());
        manager.stop().await.unwrap();
    }
}
