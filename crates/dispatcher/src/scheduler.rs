use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use jobflow_core::{
    CronTrigger, EnqueueOptions, JobDefinition, JobError, JobResult, ProcessContext,
    ProcessIdentity, TriggerCallback, WorkQueue,
};
use jobflow_worker::{ConsumerConfig, ConsumerManager};
use tracing::{info, warn};

use crate::cron_utils::CronScheduler;
use crate::enqueue::Enqueuer;
use crate::leader::LeaderGate;
use crate::scheduled_job::ScheduledJob;

/// 任务注册与调度的入口
///
/// 同一组任务定义在每个进程上注册一次：每个任务都会得到一个消费者，
/// 带定时表达式的任务还会在本地布置定时器，但只有领导者的触发会真正入队。
pub struct JobScheduler {
    context: ProcessContext,
    gate: LeaderGate,
    enqueuer: Enqueuer,
    consumers: Arc<ConsumerManager>,
    trigger: Arc<dyn CronTrigger>,
}

impl JobScheduler {
    pub fn new(context: ProcessContext, trigger: Arc<dyn CronTrigger>) -> Self {
        let consumers = Arc::new(ConsumerManager::new(
            context.queue(),
            ConsumerConfig::from(&context.config().queue),
        ));
        Self::with_consumers(context, consumers, trigger)
    }

    pub fn with_consumers(
        context: ProcessContext,
        consumers: Arc<ConsumerManager>,
        trigger: Arc<dyn CronTrigger>,
    ) -> Self {
        let gate = LeaderGate::new(context.store(), &context.config().scheduling.leader_key);
        let enqueuer = Enqueuer::new(context.queue());
        Self {
            context,
            gate,
            enqueuer,
            consumers,
            trigger,
        }
    }

    pub fn identity(&self) -> &ProcessIdentity {
        self.context.identity()
    }

    pub fn leader_gate(&self) -> &LeaderGate {
        &self.gate
    }

    pub fn consumers(&self) -> &Arc<ConsumerManager> {
        &self.consumers
    }

    /// 把本进程写入领导者键
    pub async fn register_as_leader_candidate(&self) -> JobResult<()> {
        self.gate.register_as_candidate(self.identity()).await
    }

    pub async fn is_leader(&self) -> bool {
        self.gate.is_leader(self.identity()).await
    }

    /// 批量注册任务
    ///
    /// 先整体校验，再依次注册消费者和定时器。返回的任何错误都意味着
    /// 调度未完整布置，调用方不应继续提供服务。领导者键写入失败只记录日志。
    pub async fn register_jobs(&self, jobs: Vec<JobDefinition>) -> JobResult<()> {
        Self::validate_jobs(&jobs)?;

        let scheduling = &self.context.config().scheduling;
        if scheduling.register_candidate {
            if let Err(e) = self.register_as_leader_candidate().await {
                warn!(
                    "Continuing without cron leadership, scheduled jobs will not be enqueued by this process: {}",
                    e
                );
            }
        }

        for job in &jobs {
            self.consumers
                .register(&job.name, job.handler.clone(), job.concurrency, &job.middlewares)
                .await?;

            let Some(expression) = &job.schedule else {
                continue;
            };
            if !scheduling.enabled {
                info!("Scheduling disabled, timer for job '{}' not armed", job.name);
                continue;
            }

            let scheduled = Arc::new(ScheduledJob::new(
                job,
                self.identity().clone(),
                self.gate.clone(),
                self.enqueuer.clone(),
            ));
            let callback: TriggerCallback = Arc::new(move || {
                let scheduled = scheduled.clone();
                async move {
                    scheduled.run().await;
                }
                .boxed()
            });
            self.trigger.schedule(expression, callback)?;
            info!("Scheduled job '{}' with '{}'", job.name, expression);
        }

        info!("Registered {} job(s)", jobs.len());
        Ok(())
    }

    fn validate_jobs(jobs: &[JobDefinition]) -> JobResult<()> {
        let mut names = HashSet::new();
        for job in jobs {
            job.validate()?;
            if !names.insert(job.name.as_str()) {
                return Err(JobError::DuplicateJob {
                    name: job.name.clone(),
                });
            }
            if let Some(expression) = &job.schedule {
                CronScheduler::validate_cron_expression(expression)?;
            }
        }
        Ok(())
    }

    /// 启动所有已注册队列的消费，立即返回
    pub async fn start_consumers(&self) -> JobResult<()> {
        self.consumers.run().await
    }

    pub async fn enqueue_now(
        &self,
        queue: &str,
        class: &str,
        args: serde_json::Value,
    ) -> JobResult<String> {
        self.enqueuer.enqueue_now(queue, class, args).await
    }

    pub async fn enqueue_after_delay(
        &self,
        queue: &str,
        class: &str,
        args: serde_json::Value,
        delay: Duration,
    ) -> JobResult<String> {
        self.enqueuer
            .enqueue_after_delay(queue, class, args, delay)
            .await
    }

    pub async fn enqueue_at(
        &self,
        queue: &str,
        class: &str,
        args: serde_json::Value,
        at: DateTime<Utc>,
    ) -> JobResult<String> {
        self.enqueuer.enqueue_at(queue, class, args, at).await
    }

    pub async fn enqueue_with_options(
        &self,
        queue: &str,
        class: &str,
        args: serde_json::Value,
        options: &EnqueueOptions,
    ) -> JobResult<String> {
        self.enqueuer
            .enqueue_with_options(queue, class, args, options)
            .await
    }

    pub async fn queue_size(&self, queue: &str) -> JobResult<u64> {
        self.context.queue().queue_size(queue).await
    }

    /// 撤销定时器并停止消费
    pub async fn shutdown(&self) -> JobResult<()> {
        self.trigger.stop();
        self.consumers.stop().await
    }
}
