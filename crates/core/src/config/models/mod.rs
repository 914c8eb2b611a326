pub mod app_config;
pub mod dispatcher_worker;
pub mod logging;

pub use app_config::AppConfig;
pub use dispatcher_worker::{default_worker_count, SchedulerConfig, SupervisorConfig, WorkerConfig};
pub use logging::LoggingConfig;
