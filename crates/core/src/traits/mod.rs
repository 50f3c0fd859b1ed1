pub mod handler;
pub mod scheduler;
pub mod store;
pub mod work_queue;

pub use handler::*;
pub use scheduler::*;
pub use store::*;
pub use work_queue::*;
