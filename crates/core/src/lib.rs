pub mod config;
pub mod context;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::{
    AppConfig, Backend, JobConfig, LogFormat, ObservabilityConfig, QueueConfig, RedisConfig,
    SchedulingConfig,
};
pub use context::ProcessContext;
pub use errors::*;
pub use models::{EnqueueOptions, JobDefinition, Message, ProcessIdentity, DEFAULT_RETRY_MAX};
pub use traits::{
    handler_fn, CronTrigger, Delivery, JobHandler, Middleware, Next, SharedStore, TriggerCallback,
    WorkQueue,
};
