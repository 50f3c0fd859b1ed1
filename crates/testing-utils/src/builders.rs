//! Builders for test configuration, contexts and jobs

use std::sync::{Arc, Mutex};

use jobflow_core::{
    handler_fn, AppConfig, Backend, JobDefinition, JobError, Message, ProcessContext,
    ProcessIdentity, SharedStore, WorkQueue,
};

/// 使用内存后端与短轮询间隔的配置
pub fn test_config() -> AppConfig {
    let mut config = AppConfig {
        backend: Backend::Memory,
        ..AppConfig::default()
    };
    config.queue.poll_interval_ms = 10;
    config.queue.shutdown_timeout_seconds = 5;
    config
}

/// 以给定标识构造一个进程上下文，多个上下文可共享同一组协作方
///
/// 标识同时用作处理中列表的归属，模拟各自独立的进程。
pub fn test_context(
    identity: &str,
    store: Arc<dyn SharedStore>,
    queue: Arc<dyn WorkQueue>,
) -> ProcessContext {
    let mut config = test_config();
    config.queue.process_id = identity.to_string();
    ProcessContext::with_identity(ProcessIdentity::from(identity), config, store, queue)
}

/// 记录每次调用收到的消息
#[derive(Clone, Default)]
pub struct JobRecorder {
    calls: Arc<Mutex<Vec<Message>>>,
}

impl JobRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Message> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Builder for [`JobDefinition`] backed by a [`JobRecorder`]
pub struct TestJobBuilder {
    name: String,
    schedule: Option<String>,
    concurrency: usize,
    args: serde_json::Value,
    fail_with: Option<String>,
}

impl TestJobBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schedule: None,
            concurrency: 1,
            args: serde_json::Value::Null,
            fail_with: None,
        }
    }

    pub fn with_schedule(mut self, schedule: &str) -> Self {
        self.schedule = Some(schedule.to_string());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    pub fn failing(mut self, error: &str) -> Self {
        self.fail_with = Some(error.to_string());
        self
    }

    pub fn build(self) -> (JobDefinition, JobRecorder) {
        let recorder = JobRecorder::new();
        let calls = recorder.calls.clone();
        let fail_with = self.fail_with;
        let handler = handler_fn(move |message: Message| {
            calls.lock().unwrap().push(message);
            let result = match &fail_with {
                Some(err) => Err(JobError::handler_failed(err.clone())),
                None => Ok(()),
            };
            async move { result }
        });

        let mut job = JobDefinition::new(&self.name, handler)
            .with_concurrency(self.concurrency)
            .with_args(self.args);
        if let Some(schedule) = self.schedule {
            job = job.with_schedule(&schedule);
        }
        (job, recorder)
    }
}
