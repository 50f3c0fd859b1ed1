use std::sync::Arc;

use crate::config::AppConfig;
use crate::models::ProcessIdentity;
use crate::traits::{SharedStore, WorkQueue};

/// 进程级上下文
///
/// 启动时创建一次，持有共享存储、工作队列、进程标识和配置，
/// 显式传给每个需要协作方句柄的组件。
#[derive(Clone)]
pub struct ProcessContext {
    identity: ProcessIdentity,
    store: Arc<dyn SharedStore>,
    queue: Arc<dyn WorkQueue>,
    config: Arc<AppConfig>,
}

impl ProcessContext {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn SharedStore>,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self::with_identity(ProcessIdentity::generate(), config, store, queue)
    }

    pub fn with_identity(
        identity: ProcessIdentity,
        config: AppConfig,
        store: Arc<dyn SharedStore>,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self {
            identity,
            store,
            queue,
            config: Arc::new(config),
        }
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    pub fn store(&self) -> Arc<dyn SharedStore> {
        Arc::clone(&self.store)
    }

    pub fn queue(&self) -> Arc<dyn WorkQueue> {
        Arc::clone(&self.queue)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext")
            .field("identity", &self.identity)
            .field("backend", &self.config.backend)
            .finish()
    }
}
