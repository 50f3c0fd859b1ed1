use std::time::Instant;

use async_trait::async_trait;
use jobflow_core::{JobResult, Message, Middleware, Next};
use jobflow_infrastructure::StructuredLogger;

/// 执行拦截器
///
/// 每次调用前后各输出一条结构化事件（`job_start` / `job_finish`），
/// 原样返回内层的结果。总是位于任务特有中间件之内、处理函数之外。
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionInterceptor;

#[async_trait]
impl Middleware for ExecutionInterceptor {
    async fn call(&self, queue: &str, message: &Message, next: Next<'_>) -> JobResult<()> {
        let start = Instant::now();
        StructuredLogger::log_job_start(queue, message);

        let result = next.run(queue, message).await;

        let error_message = result.as_ref().err().map(ToString::to_string);
        StructuredLogger::log_job_finish(
            queue,
            message,
            start.elapsed().as_millis() as u64,
            error_message.as_deref(),
        );
        result
    }
}
