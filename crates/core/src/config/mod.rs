//! 配置管理
//!
//! 应用配置在启动时读取一次，按以下优先级合并（后者覆盖前者）：
//!
//! 1. 内置默认值
//! 2. TOML 配置文件（`--config` 指定，或 `config/taskqueue.toml`）
//! 3. `TASKQUEUE_` 前缀的环境变量，配置段之间用 `__` 分隔
//!
//! ```rust,no_run
//! use taskqueue_core::config::AppConfig;
//!
//! let config = AppConfig::load(None).expect("配置加载失败");
//! println!("worker 数量: {}", config.supervisor.worker_count);
//! ```

pub mod models;

pub use models::{
    default_worker_count, AppConfig, LoggingConfig, SchedulerConfig, SupervisorConfig,
    WorkerConfig,
};
