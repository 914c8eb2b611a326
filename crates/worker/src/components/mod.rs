pub mod heartbeat_manager;
pub mod scheduler_client;
pub mod task_execution;
pub mod worker_lifecycle;
pub mod worker_state;

pub use heartbeat_manager::{HeartbeatHandle, HeartbeatManager};
pub use scheduler_client::{LocalSchedulerClient, SchedulerClient};
pub use task_execution::{ExecutionOutcome, TaskExecutionManager};
pub use worker_lifecycle::WorkerLifecycle;
pub use worker_state::{CurrentTaskGuard, WorkerState};
