pub mod app_config;
pub mod message_queue;
pub mod observability;
pub mod scheduling;

// Re-export main types for easier imports
pub use app_config::{AppConfig, Backend};
pub use message_queue::{QueueConfig, RedisConfig};
pub use observability::{LogFormat, ObservabilityConfig};
pub use scheduling::{JobConfig, SchedulingConfig};
