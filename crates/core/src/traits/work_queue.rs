use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{models::Message, JobResult};

/// 一次投递
///
/// `raw` 保留队列中的原始编码，确认时按原文从 `consumer` 的处理中列表移除。
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub raw: String,
    pub consumer: String,
}

/// 持久化工作队列抽象接口
///
/// 多生产者/多消费者，至少投递一次，不保证顺序。
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// 立即放入 `message.queue` 的就绪队列
    async fn push(&self, message: &Message) -> JobResult<()>;

    /// 放入延迟集合，到达 `at` 之后才会进入就绪队列
    async fn push_scheduled(&self, message: &Message, at: DateTime<Utc>) -> JobResult<()>;

    /// 放入重试集合，到达 `at` 之后才会进入就绪队列
    async fn push_retry(&self, message: &Message, at: DateTime<Utc>) -> JobResult<()>;

    /// 从就绪队列取出一条消息并移入 `consumer` 的处理中列表，队列为空时返回 `None`
    async fn fetch(&self, queue: &str, consumer: &str) -> JobResult<Option<Delivery>>;

    /// 确认处理完成，从处理中列表移除
    async fn acknowledge(&self, delivery: &Delivery) -> JobResult<()>;

    /// 把延迟集合与重试集合中已到期的消息移入各自的就绪队列，返回移动数量
    async fn promote_due(&self, now: DateTime<Utc>) -> JobResult<usize>;

    /// 把 `consumer` 处理中列表里遗留的消息放回就绪队列，返回恢复数量
    ///
    /// 只触及该消费者自己的列表，其他消费者正在处理的消息不受影响。
    async fn requeue_in_flight(&self, queue: &str, consumer: &str) -> JobResult<usize>;

    /// 就绪队列长度
    async fn queue_size(&self, queue: &str) -> JobResult<u64>;

    /// 延迟集合长度
    async fn scheduled_size(&self) -> JobResult<u64>;

    /// 重试集合长度
    async fn retry_size(&self) -> JobResult<u64>;
}
