pub mod app;
pub mod shutdown;

pub use app::{jobs_from_config, Application};
pub use shutdown::ShutdownManager;
