use std::sync::Mutex;

use chrono::Utc;
use jobflow_core::{CronTrigger, JobError, JobResult, TriggerCallback};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::cron_utils::{CronScheduler, Recurrence};

/// 基于tokio的本地定时器
///
/// 每个表达式一个独立任务；每次触发时另起任务执行回调，
/// 回调耗时不会推迟下一次触发。
#[derive(Default)]
pub struct TokioCronTrigger {
    entries: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioCronTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CronTrigger for TokioCronTrigger {
    fn schedule(&self, expression: &str, callback: TriggerCallback) -> JobResult<()> {
        let scheduler = CronScheduler::new(expression)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| JobError::Internal(format!("定时器需要在tokio运行时中创建: {e}")))?;

        let handle = runtime.spawn(run_entry(scheduler, callback));
        self.entries
            .lock()
            .map_err(|_| JobError::Internal("定时器状态锁已损坏".to_string()))?
            .push(handle);
        debug!("Armed timer '{}'", expression);
        Ok(())
    }

    fn stop(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            for handle in entries.drain(..) {
                handle.abort();
            }
        }
    }
}

impl Drop for TokioCronTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 固定间隔的节拍器，运行时停顿期间错过的节拍不补发
fn every_ticker(interval: std::time::Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run_entry(scheduler: CronScheduler, callback: TriggerCallback) {
    match scheduler.recurrence().clone() {
        Recurrence::Every(interval) => {
            let mut ticker = every_ticker(interval);
            loop {
                ticker.tick().await;
                tokio::spawn(callback());
            }
        }
        Recurrence::Cron(_) => loop {
            let now = Utc::now();
            let Some(wait) = scheduler.time_until_next_execution(now) else {
                warn!(
                    "Timer '{}' has no upcoming execution, stopping",
                    scheduler.expression()
                );
                break;
            };
            sleep(wait).await;
            tokio::spawn(callback());
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_callback(counter: Arc<AtomicUsize>) -> TriggerCallback {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_fires_on_interval() {
        let trigger = TokioCronTrigger::new();
        let hits = Arc::new(AtomicUsize::new(0));
        trigger
            .schedule("@every 1s", counting_callback(hits.clone()))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        trigger.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(trigger.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_skips_ticks_missed_during_stall() {
        let mut ticker = every_ticker(Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(5500)).await;

        // 停顿结束后只补一次，随后回到原有节奏
        ticker.tick().await;
        let resumed = Instant::now();
        ticker.tick().await;
        assert!(resumed.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_invalid_expression_is_rejected() {
        let trigger = TokioCronTrigger::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let result = trigger.schedule("not a cron", counting_callback(hits));
        assert!(matches!(result, Err(JobError::InvalidCron { .. })));
        assert!(trigger.is_empty());
    }
}
