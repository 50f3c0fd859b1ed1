//! 任务处理函数与中间件接口
//!
//! 中间件按注册顺序由外向内包裹处理函数，每个中间件通过 [`Next::run`]
//! 把调用交给链中的下一个环节，并原样返回其结果。

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{models::Message, JobResult};

/// 任务处理函数
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn perform(&self, message: &Message) -> JobResult<()>;
}

/// 包裹一次任务调用的中间件
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn call(&self, queue: &str, message: &Message, next: Next<'_>) -> JobResult<()>;
}

/// 中间件链中剩余的部分
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    handler: &'a dyn JobHandler,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Middleware>], handler: &'a dyn JobHandler) -> Self {
        Self { chain, handler }
    }

    pub async fn run(self, queue: &str, message: &Message) -> JobResult<()> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                head.call(queue, message, Next::new(rest, self.handler))
                    .await
            }
            None => self.handler.perform(message).await,
        }
    }
}

/// 闭包形式的处理函数
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = JobResult<()>> + Send + 'static,
{
    async fn perform(&self, message: &Message) -> JobResult<()> {
        (self.f)(message.clone()).await
    }
}

/// 把异步闭包包装成 [`JobHandler`]
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobResult<()>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}
