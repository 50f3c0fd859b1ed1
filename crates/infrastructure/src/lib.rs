pub mod backend_factory;
pub mod in_memory_queue;
pub mod in_memory_store;
pub mod observability;
pub mod redis_backend;

pub use backend_factory::BackendFactory;
pub use in_memory_queue::InMemoryWorkQueue;
pub use in_memory_store::InMemorySharedStore;
pub use observability::{init_logging, StructuredLogger};
pub use redis_backend::{RedisConnectionPool, RedisSharedStore, RedisWorkQueue};
