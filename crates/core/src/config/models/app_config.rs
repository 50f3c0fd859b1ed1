use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    message_queue::{QueueConfig, RedisConfig},
    observability::ObservabilityConfig,
    scheduling::{JobConfig, SchedulingConfig},
};

/// 共享存储与工作队列的实现方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Redis,
    /// 进程内实现，只适合单进程部署与测试
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    pub store: RedisConfig,
    pub queue: QueueConfig,
    pub scheduling: SchedulingConfig,
    pub jobs: BTreeMap<String, JobConfig>,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/jobflow.toml",
                "jobflow.toml",
                "/etc/jobflow/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("JOBFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.store.validate().context("共享存储配置无效")?;
        self.queue.validate().context("工作队列配置无效")?;
        self.scheduling.validate()?;
        for (name, job) in &self.jobs {
            job.validate(name)?;
        }
        self.observability.validate()?;
        Ok(())
    }

    /// 工作队列实际使用的Redis配置
    pub fn queue_redis(&self) -> RedisConfig {
        self.queue.effective_redis(&self.store)
    }
}
