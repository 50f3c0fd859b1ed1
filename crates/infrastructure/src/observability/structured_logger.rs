//! Structured logging utilities
//!
//! Every helper emits an `event` field so log pipelines can filter on it.

use jobflow_core::{JobError, Message};
use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    fn payload(message: &Message) -> String {
        message
            .serialize()
            .unwrap_or_else(|_| format!("<unserializable message {}>", message.jid))
    }

    /// Log the start of a job invocation
    pub fn log_job_start(queue: &str, message: &Message) {
        info!(
            event = "job_start",
            job.queue = queue,
            job.jid = %message.jid,
            job.class = %message.class,
            job.payload = %Self::payload(message),
            "job start: {}",
            queue
        );
    }

    /// Log the end of a job invocation, successful or not
    pub fn log_job_finish(
        queue: &str,
        message: &Message,
        duration_ms: u64,
        error_message: Option<&str>,
    ) {
        match error_message {
            None => info!(
                event = "job_finish",
                job.queue = queue,
                job.jid = %message.jid,
                job.class = %message.class,
                job.payload = %Self::payload(message),
                job.success = true,
                job.duration_ms = duration_ms,
                "job finish: {}",
                queue
            ),
            Some(err) => error!(
                event = "job_finish",
                job.queue = queue,
                job.jid = %message.jid,
                job.class = %message.class,
                job.payload = %Self::payload(message),
                job.success = false,
                job.duration_ms = duration_ms,
                job.error = err,
                "job finish: {}",
                queue
            ),
        }
    }

    pub fn log_job_retry_scheduled(message: &Message, retry_at: chrono::DateTime<chrono::Utc>) {
        warn!(
            event = "job_retry_scheduled",
            job.queue = %message.queue,
            job.jid = %message.jid,
            job.retry_count = message.retry_count,
            job.retry_at = %retry_at,
            "Job failed, retry scheduled"
        );
    }

    pub fn log_job_retries_exhausted(message: &Message) {
        error!(
            event = "job_retries_exhausted",
            job.queue = %message.queue,
            job.jid = %message.jid,
            job.retry_count = message.retry_count,
            "Job failed and exhausted its retries"
        );
    }

    pub fn log_scheduled_job_enqueued(job_name: &str, class: &str, args: &serde_json::Value) {
        info!(
            event = "scheduled_job_enqueued",
            job.name = job_name,
            job.class = class,
            job.args = %args,
            "scheduled job start"
        );
    }

    pub fn log_scheduled_job_skipped(job_name: &str, identity: &str) {
        debug!(
            event = "scheduled_job_skipped",
            job.name = job_name,
            process.identity = identity,
            "Not the cron leader, scheduled occurrence skipped"
        );
    }

    pub fn log_enqueue_failed(
        queue: &str,
        class: &str,
        args: &serde_json::Value,
        timing: Option<&str>,
        err: &JobError,
    ) {
        error!(
            event = "enqueue_failed",
            job.queue = queue,
            job.class = class,
            job.args = %args,
            job.timing = timing.unwrap_or("now"),
            error = %err,
            "Failed to enqueue job"
        );
    }

    pub fn log_leader_registered(key: &str, identity: &str) {
        info!(
            event = "leader_registered",
            leader.key = key,
            process.identity = identity,
            "Registered as cron leader candidate"
        );
    }

    pub fn log_leader_registration_failed(key: &str, identity: &str, err: &JobError) {
        error!(
            event = "leader_registration_failed",
            leader.key = key,
            process.identity = identity,
            error = %err,
            "Failed to register as cron leader candidate"
        );
    }

    pub fn log_system_error(component: &str, operation: &str, err: &JobError) {
        error!(
            event = "system_error",
            component = component,
            operation = operation,
            error = %err,
            "System error occurred"
        );
    }
}
