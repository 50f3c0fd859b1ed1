use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobflow_core::{Delivery, JobResult, Message, WorkQueue};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 内存工作队列实现
///
/// 语义与Redis实现一致（就绪队列、处理中列表、延迟集合、重试集合），
/// 适用于单进程部署和测试。克隆出的实例共享同一份状态。
/// 处理中列表按（队列，消费者）分开保存。
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkQueue {
    state: Arc<Mutex<QueueState>>,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: HashMap<String, VecDeque<String>>,
    in_flight: HashMap<(String, String), Vec<String>>,
    scheduled: Vec<(DateTime<Utc>, String)>,
    retry: Vec<(DateTime<Utc>, String)>,
}

impl QueueState {
    fn push_ready(&mut self, queue: &str, raw: String) {
        self.ready
            .entry(queue.to_string())
            .or_default()
            .push_front(raw);
    }

    fn take_due(set: &mut Vec<(DateTime<Utc>, String)>, now: DateTime<Utc>) -> Vec<String> {
        let (due, pending): (Vec<_>, Vec<_>) = set.drain(..).partition(|(at, _)| *at <= now);
        *set = pending;
        due.into_iter().map(|(_, raw)| raw).collect()
    }
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 就绪队列中所有消息的快照（按投递顺序）
    pub async fn snapshot(&self, queue: &str) -> Vec<Message> {
        let state = self.state.lock().await;
        state
            .ready
            .get(queue)
            .map(|items| {
                items
                    .iter()
                    .rev()
                    .filter_map(|raw| Message::deserialize(raw).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 所有消费者在该队列上的处理中消息数
    pub async fn in_flight_size(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state
            .in_flight
            .iter()
            .filter(|((name, _), _)| name == queue)
            .map(|(_, items)| items.len())
            .sum()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn push(&self, message: &Message) -> JobResult<()> {
        let raw = message.serialize()?;
        let mut state = self.state.lock().await;
        state.push_ready(&message.queue, raw);
        debug!("Pushed message {} to in-memory queue {}", message.jid, message.queue);
        Ok(())
    }

    async fn push_scheduled(&self, message: &Message, at: DateTime<Utc>) -> JobResult<()> {
        let raw = message.clone().scheduled_at(at).serialize()?;
        let mut state = self.state.lock().await;
        state.scheduled.push((at, raw));
        Ok(())
    }

    async fn push_retry(&self, message: &Message, at: DateTime<Utc>) -> JobResult<()> {
        let raw = message.clone().scheduled_at(at).serialize()?;
        let mut state = self.state.lock().await;
        state.retry.push((at, raw));
        Ok(())
    }

    async fn fetch(&self, queue: &str, consumer: &str) -> JobResult<Option<Delivery>> {
        let mut state = self.state.lock().await;
        let Some(raw) = state.ready.get_mut(queue).and_then(VecDeque::pop_back) else {
            return Ok(None);
        };

        match Message::deserialize(&raw) {
            Ok(message) => {
                state
                    .in_flight
                    .entry((queue.to_string(), consumer.to_string()))
                    .or_default()
                    .push(raw.clone());
                Ok(Some(Delivery {
                    message,
                    raw,
                    consumer: consumer.to_string(),
                }))
            }
            Err(e) => {
                warn!("Dropping malformed message from queue {}: {}", queue, e);
                Ok(None)
            }
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) -> JobResult<()> {
        let mut state = self.state.lock().await;
        let key = (delivery.message.queue.clone(), delivery.consumer.clone());
        if let Some(items) = state.in_flight.get_mut(&key) {
            if let Some(pos) = items.iter().rposition(|raw| *raw == delivery.raw) {
                items.remove(pos);
                return Ok(());
            }
        }
        warn!(
            "Message {} was not in the in-progress list of queue {} (consumer {})",
            delivery.message.jid, delivery.message.queue, delivery.consumer
        );
        Ok(())
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> JobResult<usize> {
        let mut state = self.state.lock().await;
        let mut due = QueueState::take_due(&mut state.scheduled, now);
        due.extend(QueueState::take_due(&mut state.retry, now));

        let mut promoted = 0;
        for raw in due {
            match Message::deserialize(&raw) {
                Ok(mut message) => {
                    message.at = None;
                    let ready = message.serialize()?;
                    state.push_ready(&message.queue, ready);
                    promoted += 1;
                }
                Err(e) => warn!("Dropping malformed scheduled message: {}", e),
            }
        }
        Ok(promoted)
    }

    async fn requeue_in_flight(&self, queue: &str, consumer: &str) -> JobResult<usize> {
        let mut state = self.state.lock().await;
        let leftovers = state
            .in_flight
            .remove(&(queue.to_string(), consumer.to_string()))
            .unwrap_or_default();
        let recovered = leftovers.len();
        for raw in leftovers {
            state.push_ready(queue, raw);
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
        let state = self.state.lock().await;
        Ok(state.ready.get(queue).map_or(0, |items| items.len() as u64))
    }

    async fn scheduled_size(&self) -> JobResult<u64> {
        Ok(self.state.lock().await.scheduled.len() as u64)
    }

    async fn retry_size(&self) -> JobResult<u64> {
        Ok(self.state.lock().await.retry.len() as u64)
    }
}
