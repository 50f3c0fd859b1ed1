use serde::{Deserialize, Serialize};

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub password: Option<String>,
    pub connection_timeout_seconds: u64,
    pub max_retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
            connection_timeout_seconds: 30,
            max_retry_attempts: 3,
            retry_delay_seconds: 1,
        }
    }
}

impl RedisConfig {
    /// Validate Redis configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.is_empty() {
            return Err(anyhow::anyhow!("Redis主机地址不能为空"));
        }

        if self.port == 0 {
            return Err(anyhow::anyhow!("Redis端口必须大于0"));
        }

        if self.database < 0 {
            return Err(anyhow::anyhow!("Redis数据库索引不能为负数"));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Redis连接超时时间必须大于0"));
        }

        if self.max_retry_attempts == 0 {
            return Err(anyhow::anyhow!("Redis最大重试次数必须大于0"));
        }

        Ok(())
    }

    /// Build Redis connection URL
    pub fn build_url(&self) -> String {
        self.build_url_with_database(self.database)
    }

    /// Build Redis connection URL against another database index
    pub fn build_url_with_database(&self, database: i64) -> String {
        let auth = if let Some(password) = &self.password {
            format!(":{password}@")
        } else {
            String::new()
        };
        format!("redis://{}{}:{}/{}", auth, self.host, self.port, database)
    }
}

/// 工作队列配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// 队列所用的Redis，缺省时沿用共享存储的地址与凭据
    pub redis: Option<RedisConfig>,
    /// 队列使用的数据库索引，与共享存储分开
    pub database: i64,
    /// 连接池大小
    pub pool_size: usize,
    /// 处理中列表的归属标识，默认 `主机名:pid`，每个进程各不相同。
    /// 配置成固定值后，进程重启时才能找回上次遗留在处理中列表里的消息；
    /// 同时运行的进程不能共用同一个值。
    pub process_id: String,
    /// 键前缀
    pub namespace: String,
    /// 空队列退避与延迟集合轮询的间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 停止时等待处理中任务的最长时间（秒）
    pub shutdown_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis: None,
            database: 0,
            pool_size: 4,
            process_id: default_process_id(),
            namespace: "jobflow:".to_string(),
            poll_interval_ms: 1000,
            shutdown_timeout_seconds: 30,
        }
    }
}

fn default_process_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{}:{}", host, std::process::id())
}

impl QueueConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }

        if self.database < 0 {
            return Err(anyhow::anyhow!("队列数据库索引不能为负数"));
        }

        if self.pool_size == 0 {
            return Err(anyhow::anyhow!("队列连接池大小必须大于0"));
        }

        if self.process_id.trim().is_empty() {
            return Err(anyhow::anyhow!("进程标识不能为空"));
        }

        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }

        Ok(())
    }

    /// 队列实际使用的Redis配置
    pub fn effective_redis(&self, store: &RedisConfig) -> RedisConfig {
        let mut redis = self.redis.clone().unwrap_or_else(|| store.clone());
        redis.database = self.database;
        redis
    }
}
