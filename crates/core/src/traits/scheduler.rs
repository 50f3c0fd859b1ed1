use std::sync::Arc;

use futures::future::BoxFuture;

use crate::JobResult;

/// 定时器触发时调用的回调
pub type TriggerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// 定时触发能力
///
/// 按表达式在本进程内周期性地调用回调。每个进程的定时器独立触发，
/// 是否真正产生工作由回调自己决定。
pub trait CronTrigger: Send + Sync {
    /// 解析表达式并布置定时器，表达式无效时返回错误
    fn schedule(&self, expression: &str, callback: TriggerCallback) -> JobResult<()>;

    /// 停止所有已布置的定时器
    fn stop(&self);
}
