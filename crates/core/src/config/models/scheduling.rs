use serde::{Deserialize, Serialize};

/// 定时调度配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulingConfig {
    /// 是否布置定时器
    pub enabled: bool,
    /// 启动时是否把本进程写入领导者键
    pub register_candidate: bool,
    /// 共享存储中领导者键的名称
    pub leader_key: String,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            register_candidate: true,
            leader_key: "active_node:cron".to_string(),
        }
    }
}

impl SchedulingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.leader_key.trim().is_empty() {
            return Err(anyhow::anyhow!("领导者键名称不能为空"));
        }
        Ok(())
    }
}

/// 单个任务的配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobConfig {
    pub concurrency: usize,
    pub schedule: Option<String>,
    pub class: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub args: serde_json::Value,
    pub retry: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            schedule: None,
            class: None,
            args: serde_json::Value::Null,
            retry: false,
        }
    }
}

impl JobConfig {
    pub fn validate(&self, name: &str) -> anyhow::Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow::anyhow!("任务名称不能为空"));
        }
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("任务 {name} 的并发数必须大于0"));
        }
        if let Some(schedule) = &self.schedule {
            if schedule.trim().is_empty() {
                return Err(anyhow::anyhow!("任务 {name} 的定时表达式不能为空"));
            }
        }
        Ok(())
    }
}
