//! 任务调度核心
//!
//! 该 crate 提供进程内的优先级任务队列：
//!
//! - [`queue`]: high / normal / low 三条先进先出通道
//! - [`retry_service`]: 指数退避重试策略
//! - [`stats`]: 增量维护的统计计数器
//! - [`event_bus`]: 生命周期事件广播
//! - [`scheduler`]: 把以上组件组合在一把锁下的 [`QueueManager`]

pub mod event_bus;
pub mod queue;
pub mod retry_service;
pub mod scheduler;
pub mod stats;

pub use event_bus::EventBus;
pub use queue::PriorityQueueSet;
pub use retry_service::{RetryConfig, RetryDecision};
pub use scheduler::{BatchSubmission, QueueManager};
pub use stats::StatsCounters;
