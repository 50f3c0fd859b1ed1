//! 中间件链的组装
//!
//! 由外向内：默认中间件（重试、统计）→ 任务特有中间件 → 执行拦截器 → 处理函数。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use jobflow_core::{JobError, JobHandler, JobResult, Message, Middleware, Next, WorkQueue};
use metrics::{counter, histogram};

use crate::interceptor::ExecutionInterceptor;
use crate::retry::RetryMiddleware;

/// 一条组装完成的调用链
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
    handler: Arc<dyn JobHandler>,
}

impl MiddlewareChain {
    pub fn build(
        defaults: &[Arc<dyn Middleware>],
        job_middlewares: &[Arc<dyn Middleware>],
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        let mut middlewares: Vec<Arc<dyn Middleware>> =
            Vec::with_capacity(defaults.len() + job_middlewares.len() + 1);
        middlewares.extend(defaults.iter().cloned());
        middlewares.extend(job_middlewares.iter().cloned());
        middlewares.push(Arc::new(ExecutionInterceptor));

        Self {
            middlewares: Arc::new(middlewares),
            handler: Arc::new(CatchUnwindHandler { inner: handler }),
        }
    }

    pub async fn invoke(&self, queue: &str, message: &Message) -> JobResult<()> {
        Next::new(&self.middlewares, self.handler.as_ref())
            .run(queue, message)
            .await
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// 所有队列共用的默认中间件
pub fn default_middlewares(queue: Arc<dyn WorkQueue>) -> Vec<Arc<dyn Middleware>> {
    vec![
        Arc::new(RetryMiddleware::new(queue)),
        Arc::new(StatsMiddleware),
    ]
}

/// 把处理函数的panic转换为 [`JobError::HandlerPanicked`]
struct CatchUnwindHandler {
    inner: Arc<dyn JobHandler>,
}

#[async_trait]
impl JobHandler for CatchUnwindHandler {
    async fn perform(&self, message: &Message) -> JobResult<()> {
        match AssertUnwindSafe(self.inner.perform(message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(JobError::HandlerPanicked(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 处理数量与耗时统计
#[derive(Debug, Default, Clone, Copy)]
pub struct StatsMiddleware;

#[async_trait]
impl Middleware for StatsMiddleware {
    async fn call(&self, queue: &str, message: &Message, next: Next<'_>) -> JobResult<()> {
        let start = Instant::now();
        let result = next.run(queue, message).await;

        histogram!("jobflow_job_duration_ms", "queue" => queue.to_string())
            .record(start.elapsed().as_millis() as f64);
        counter!("jobflow_jobs_processed_total", "queue" => queue.to_string()).increment(1);
        if result.is_err() {
            counter!("jobflow_jobs_failed_total", "queue" => queue.to_string()).increment(1);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobflow_core::handler_fn;
    use std::sync::Mutex;

    struct Record(&'static str, Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Middleware for Record {
        async fn call(&self, queue: &str, message: &Message, next: Next<'_>) -> JobResult<()> {
            self.1.lock().unwrap().push(self.0);
            next.run(queue, message).await
        }
    }

    #[tokio::test]
    async fn test_defaults_wrap_job_middlewares() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let defaults: Vec<Arc<dyn Middleware>> =
            vec![Arc::new(Record("default", order.clone()))];
        let job: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Record("job-1", order.clone())),
            Arc::new(Record("job-2", order.clone())),
        ];
        let handler_order = order.clone();
        let handler = handler_fn(move |_msg| {
            let order = handler_order.clone();
            async move {
                order.lock().unwrap().push("handler");
                Ok(())
            }
        });

        let chain = MiddlewareChain::build(&defaults, &job, handler);
        assert_eq!(chain.len(), 4);

        chain
            .invoke("q", &Message::new("q", "C", serde_json::Value::Null))
            .await
            .unwrap();
        assert_eq!(
            *order.lock().unwrap(),
            vec!["default", "job-1", "job-2", "handler"]
        );
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let handler = handler_fn(|msg: Message| async move {
            if msg.class == "C" {
                panic!("handler exploded");
            }
            Ok(())
        });
        let chain = MiddlewareChain::build(&[], &[], handler);

        let result = chain
            .invoke("q", &Message::new("q", "C", serde_json::Value::Null))
            .await;
        match result {
            Err(JobError::HandlerPanicked(msg)) => assert_eq!(msg, "handler exploded"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stats_passes_result_through() {
        let handler = handler_fn(|_msg| async { Err(JobError::handler_failed("nope")) });
        let defaults: Vec<Arc<dyn Middleware>> = vec![Arc::new(StatsMiddleware)];
        let chain = MiddlewareChain::build(&defaults, &[], handler);

        let result = chain
            .invoke("q", &Message::new("q", "C", serde_json::Value::Null))
            .await;
        assert!(matches!(result, Err(JobError::HandlerFailed(_))));
    }
}
