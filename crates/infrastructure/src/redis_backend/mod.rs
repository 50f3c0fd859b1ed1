//! Redis实现
//!
//! 共享存储与工作队列都基于Redis：领导者键是一个普通字符串键，
//! 工作队列的布局（均带命名空间前缀）：
//!
//! ```text
//! queues                                  已知队列集合
//! queue:<name>                            就绪列表（LPUSH 入，RPOPLPUSH 出）
//! queue:<name>:<process_id>:inprogress    某个消费者的处理中列表
//! schedule                                延迟集合（按到期时间打分）
//! retry                                   重试集合（按到期时间打分）
//! ```

pub mod connection_manager;
pub mod store;
pub mod work_queue;

pub use connection_manager::RedisConnectionPool;
pub use store::RedisSharedStore;
pub use work_queue::RedisWorkQueue;
