pub mod config;
pub mod errors;
pub mod models;

pub use config::{AppConfig, LoggingConfig, SchedulerConfig, SupervisorConfig, WorkerConfig};
pub use errors::{SchedulerError, SchedulerResult};
pub use models::{
    EventKind, EventPayload, NewTask, QueueLengths, SchedulerEvent, SchedulerStats, Task, TaskId,
    TaskPriority, TaskStatus, TaskSummary, WorkerHeartbeat, WorkerRecord, WorkerRegistration,
    WorkerStatus,
};
