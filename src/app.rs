use std::sync::Arc;

use anyhow::{Context, Result};
use jobflow_core::{handler_fn, AppConfig, JobConfig, JobDefinition, Message, ProcessContext};
use jobflow_dispatcher::{JobScheduler, TokioCronTrigger};
use jobflow_infrastructure::BackendFactory;
use tokio::sync::broadcast;
use tracing::info;

/// 应用组合根
pub struct Application {
    config: AppConfig,
    scheduler: JobScheduler,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store = BackendFactory::create_store(&config)
            .await
            .context("创建共享存储失败")?;
        let queue = BackendFactory::create_queue(&config)
            .await
            .context("创建工作队列失败")?;

        let context = ProcessContext::new(config.clone(), store, queue);
        info!(
            "Process identity {} ({:?} backend)",
            context.identity(),
            config.backend
        );
        let scheduler = JobScheduler::new(context, Arc::new(TokioCronTrigger::new()));

        Ok(Self { config, scheduler })
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// 注册配置中的任务并开始消费，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.start().await?;
        let _ = shutdown_rx.recv().await;
        self.stop().await
    }

    pub async fn start(&self) -> Result<()> {
        let jobs = jobs_from_config(&self.config);
        self.scheduler
            .register_jobs(jobs)
            .await
            .context("注册任务失败")?;
        self.scheduler
            .start_consumers()
            .await
            .context("启动消费者失败")?;
        info!("Application started with {} job(s)", self.config.jobs.len());
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.scheduler.shutdown().await.context("停止调度失败")?;
        info!("Application stopped");
        Ok(())
    }
}

/// 由配置生成任务定义，处理函数只记录收到的工作项
pub fn jobs_from_config(config: &AppConfig) -> Vec<JobDefinition> {
    config
        .jobs
        .iter()
        .map(|(name, job)| job_from_config(name, job))
        .collect()
}

fn job_from_config(name: &str, config: &JobConfig) -> JobDefinition {
    let handler = handler_fn(|message: Message| async move {
        info!(
            job.queue = %message.queue,
            job.class = %message.class,
            job.args = %message.args,
            "Processed job {}",
            message.jid
        );
        Ok(())
    });

    let mut job = JobDefinition::new(name, handler)
        .with_concurrency(config.concurrency)
        .with_class(config.class.as_deref().unwrap_or(name))
        .with_args(config.args.clone())
        .with_retry(config.retry);
    if let Some(schedule) = &config.schedule {
        job = job.with_schedule(schedule);
    }
    job
}
