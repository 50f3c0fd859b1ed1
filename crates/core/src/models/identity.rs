use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 进程标识
///
/// 进程启动时生成一次，生命周期内不可变。只用于和领导者键的值做比较。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessIdentity(String);

impl ProcessIdentity {
    /// 生成新的随机标识
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProcessIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
