use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 默认最大重试次数
pub const DEFAULT_RETRY_MAX: u32 = 25;

/// 工作项
///
/// 由一次入队调用（立即、延迟或定时触发）产生，至少投递一次给某个消费者。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub queue: String,
    pub class: String,
    pub args: serde_json::Value,
    pub jid: String,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_max: Option<u32>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retried_at: Option<DateTime<Utc>>,
}

/// 入队选项
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnqueueOptions {
    /// 失败后是否进入重试集合
    pub retry: bool,
    /// 最大重试次数，缺省为 [`DEFAULT_RETRY_MAX`]
    pub retry_max: Option<u32>,
    /// 指定执行时间；为空表示立即入队
    pub at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(queue: &str, class: &str, args: serde_json::Value) -> Self {
        Self {
            queue: queue.to_string(),
            class: class.to_string(),
            args,
            jid: Uuid::new_v4().simple().to_string(),
            enqueued_at: Utc::now(),
            at: None,
            retry: false,
            retry_max: None,
            retry_count: 0,
            error_message: None,
            failed_at: None,
            retried_at: None,
        }
    }

    pub fn with_options(mut self, options: &EnqueueOptions) -> Self {
        self.retry = options.retry;
        self.retry_max = options.retry_max;
        self.at = options.at;
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }

    /// 是否已用尽重试次数
    pub fn is_retry_exhausted(&self) -> bool {
        self.retry_count >= self.retry_max.unwrap_or(DEFAULT_RETRY_MAX)
    }

    /// 记录一次失败，返回用于重新调度的副本
    pub fn record_failure(&self, error: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.error_message = Some(error.to_string());
        if next.failed_at.is_none() {
            next.failed_at = Some(now);
        } else {
            next.retry_count = next.retry_count.saturating_add(1);
            next.retried_at = Some(now);
        }
        next.at = None;
        next
    }

    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
    pub fn deserialize(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_new_message_defaults() {
        let message = Message::new("q1", "ClassA", json!({"k": "v"}));
        assert_eq!(message.queue, "q1");
        assert_eq!(message.class, "ClassA");
        assert_eq!(message.args, json!({"k": "v"}));
        assert_eq!(message.jid.len(), 32);
        assert!(!message.retry);
        assert!(message.at.is_none());
    }

    #[test]
    fn test_optional_fields_are_omitted_from_json() {
        let message = Message::new("q1", "ClassA", json!([1, 2]));
        let raw = message.serialize().unwrap();
        assert!(!raw.contains("\"at\""));
        assert!(!raw.contains("error_message"));

        let parsed = Message::deserialize(&raw).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_deserialize_minimal_payload() {
        let raw = r#"{"queue":"q","class":"C","args":null,"jid":"abc","enqueued_at":"2024-01-01T00:00:00Z"}"#;
        let message = Message::deserialize(raw).unwrap();
        assert_eq!(message.retry_count, 0);
        assert!(!message.retry);
    }

    #[test]
    fn test_record_failure_counts_retries() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let message = Message::new("q", "C", json!(null)).with_options(&EnqueueOptions {
            retry: true,
            retry_max: Some(2),
            at: None,
        });

        let first = message.record_failure("boom", now);
        assert_eq!(first.retry_count, 0);
        assert_eq!(first.failed_at, Some(now));
        assert!(first.retried_at.is_none());

        let second = first.record_failure("boom again", now);
        assert_eq!(second.retry_count, 1);
        assert_eq!(second.error_message.as_deref(), Some("boom again"));
        assert!(!second.is_retry_exhausted());

        let third = second.record_failure("boom", now);
        assert!(third.is_retry_exhausted());
    }
}
