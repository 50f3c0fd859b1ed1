use std::sync::Arc;

use jobflow_core::{JobResult, ProcessIdentity, SharedStore};
use jobflow_infrastructure::StructuredLogger;
use tracing::debug;

/// 领导者选举门
///
/// 共享存储中的单个键保存当前领导者的进程标识。写入是无条件覆盖、
/// 不带过期时间，最后写入者成为领导者；读取失败或键不存在一律视为非领导者。
#[derive(Clone)]
pub struct LeaderGate {
    store: Arc<dyn SharedStore>,
    key: String,
}

impl LeaderGate {
    pub fn new(store: Arc<dyn SharedStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 把本进程写入领导者键，覆盖之前的任何值
    pub async fn register_as_candidate(&self, identity: &ProcessIdentity) -> JobResult<()> {
        match self.store.set(&self.key, identity.as_str(), None).await {
            Ok(()) => {
                StructuredLogger::log_leader_registered(&self.key, identity.as_str());
                Ok(())
            }
            Err(e) => {
                StructuredLogger::log_leader_registration_failed(&self.key, identity.as_str(), &e);
                Err(e)
            }
        }
    }

    /// 领导者键的值与 `identity` 完全相同时返回 true
    pub async fn is_leader(&self, identity: &ProcessIdentity) -> bool {
        match self.store.get(&self.key).await {
            Ok(Some(current)) => current == identity.as_str(),
            Ok(None) => false,
            Err(e) => {
                debug!("Leader check failed for key '{}', treating as follower: {}", self.key, e);
                false
            }
        }
    }

    /// 当前领导者键的值
    pub async fn current_leader(&self) -> JobResult<Option<String>> {
        self.store.get(&self.key).await
    }
}

impl std::fmt::Debug for LeaderGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderGate").field("key", &self.key).finish()
    }
}
