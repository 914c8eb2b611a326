pub mod components;
pub mod handler_registry;
pub mod service;
pub mod supervisor;

pub use components::{
    ExecutionOutcome, HeartbeatManager, LocalSchedulerClient, SchedulerClient,
    TaskExecutionManager, WorkerLifecycle, WorkerState,
};
pub use handler_registry::{
    EchoHandler, HandlerError, HandlerFn, HandlerRegistry, HandlerResult, TaskHandler,
};
pub use service::{WorkerService, WorkerServiceBuilder};
pub use supervisor::{
    PoolSnapshot, ServiceLauncher, ShutdownOutcome, WorkerLauncher, WorkerMessage,
    WorkerReporter, WorkerSpawn, WorkerSupervisor, WorkerUnitInfo,
};
