//! 队列消费端：按队列拉取消息，经中间件链调用处理函数

pub mod consumer;
pub mod interceptor;
pub mod middleware;
pub mod retry;

pub use consumer::{ConsumerConfig, ConsumerManager};
pub use interceptor::ExecutionInterceptor;
pub use middleware::{default_middlewares, MiddlewareChain, StatsMiddleware};
pub use retry::{retry_backoff, RetryMiddleware};
