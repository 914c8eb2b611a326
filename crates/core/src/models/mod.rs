//! # 数据模型
//!
//! 定义任务队列的核心数据结构：任务、Worker记录、生命周期事件与统计快照。
//!
//! ## 核心模型
//!
//! ### Task - 任务
//! 一个可执行的工作单元，带有优先级、重试上限和完整的时间戳。状态迁移由
//! [`Task::transition`] 按状态机校验。
//!
//! ### WorkerRecord - Worker记录
//! 调度器视角下的 Worker 状态（空闲/忙碌、当前任务、心跳时间、进程号）。
//!
//! ### SchedulerEvent - 生命周期事件
//! 调度器对外广播的事件，`kind` 序列化为 `task:created` 这类名称。
//!
//! ### SchedulerStats - 统计快照
//! 增量维护的计数器与通道长度等时点数据的合并视图。
//!
//! ## 设计原则
//!
//! - 所有时间字段使用 `DateTime<Utc>`
//! - 状态字段使用枚举类型，避免无效状态
//! - 所有模型实现 `Serialize`/`Deserialize`，可直接作为 JSON 对外暴露

pub mod event;
pub mod stats;
pub mod task;
pub mod worker;

pub use event::{EventKind, EventPayload, SchedulerEvent, TaskEventData};
pub use stats::{QueueLengths, SchedulerStats};
pub use task::{NewTask, Task, TaskId, TaskPriority, TaskStatus, TaskSummary};
pub use worker::{WorkerHeartbeat, WorkerRecord, WorkerRegistration, WorkerStatus};
