//! 定时调度端
//!
//! 领导者选举门、定时表达式解析、基于tokio的定时器、显式入队，
//! 以及把这些组合在一起的 [`JobScheduler`]。

pub mod cron_trigger;
pub mod cron_utils;
pub mod enqueue;
pub mod leader;
pub mod scheduled_job;
pub mod scheduler;

pub use cron_trigger::TokioCronTrigger;
pub use cron_utils::{parse_go_duration, CronScheduler, Recurrence};
pub use enqueue::Enqueuer;
pub use leader::LeaderGate;
pub use scheduled_job::ScheduledJob;
pub use scheduler::JobScheduler;
