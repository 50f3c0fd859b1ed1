use std::fmt;
use std::sync::Arc;

use crate::models::EnqueueOptions;
use crate::traits::{JobHandler, Middleware};
use crate::{JobError, JobResult};

/// 任务定义
///
/// 启动时批量注册一次，之后在进程生命周期内不可变。`name` 同时作为队列名；
/// `schedule` 为空表示该任务只能通过显式入队触发。
#[derive(Clone)]
pub struct JobDefinition {
    pub name: String,
    pub handler: Arc<dyn JobHandler>,
    pub concurrency: usize,
    pub schedule: Option<String>,
    /// 定时触发时写入工作项的类名
    pub class: String,
    /// 定时触发时写入工作项的参数
    pub args: serde_json::Value,
    /// 定时触发时的入队选项（重试等）
    pub options: EnqueueOptions,
    /// 任务特有的中间件，按顺序由外向内
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl JobDefinition {
    pub fn new(name: &str, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            name: name.to_string(),
            handler,
            concurrency: 1,
            schedule: None,
            class: name.to_string(),
            args: serde_json::Value::Null,
            options: EnqueueOptions::default(),
            middlewares: Vec::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_schedule(mut self, expression: &str) -> Self {
        self.schedule = Some(expression.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.options.retry = retry;
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn validate(&self) -> JobResult<()> {
        if self.name.trim().is_empty() {
            return Err(JobError::config_error("任务名称不能为空"));
        }
        if self.concurrency == 0 {
            return Err(JobError::InvalidConcurrency {
                name: self.name.clone(),
                concurrency: self.concurrency,
            });
        }
        if let Some(expr) = &self.schedule {
            if expr.trim().is_empty() {
                return Err(JobError::invalid_cron(expr.as_str(), "表达式为空"));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDefinition")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("schedule", &self.schedule)
            .field("class", &self.class)
            .field("args", &self.args)
            .field("options", &self.options)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
