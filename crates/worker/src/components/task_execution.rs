use std::sync::Arc;
use std::time::Duration;

use taskqueue_core::models::{Task, TaskId};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{SchedulerClient, WorkerState};
use crate::handler_registry::HandlerRegistry;
use crate::supervisor::WorkerReporter;

/// 单个任务的执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed { task_id: TaskId, elapsed: Duration },
    Failed { task_id: TaskId, error: String },
}

impl ExecutionOutcome {
    pub fn task_id(&self) -> &str {
        match self {
            ExecutionOutcome::Completed { task_id, .. } | ExecutionOutcome::Failed { task_id, .. } => {
                task_id
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }
}

pub struct TaskExecutionManager {
    worker_id: String,
    client: Arc<dyn SchedulerClient>,
    registry: Arc<HandlerRegistry>,
    state: Arc<WorkerState>,
    reporter: Option<WorkerReporter>,
}

impl TaskExecutionManager {
    pub fn new(
        worker_id: String,
        client: Arc<dyn SchedulerClient>,
        registry: Arc<HandlerRegistry>,
        state: Arc<WorkerState>,
        reporter: Option<WorkerReporter>,
    ) -> Self {
        Self {
            worker_id,
            client,
            registry,
            state,
            reporter,
        }
    }

    /// 执行一个已取出的任务并把结果上报给调度器
    ///
    /// 处理器返回错误时调用 `fail`，由调度器决定重试还是进入终态。
    /// 上报失败只记录日志，任务保持处理中状态。
    pub async fn execute(&self, task: Task) -> ExecutionOutcome {
        let _current = self.state.begin_task(&task.id);

        if !self.registry.contains(&task.task_type) {
            debug!(
                task_id = %task.id,
                task_type = %task.task_type,
                "No handler registered for task type, using fallback"
            );
        }
        let handler = self.registry.resolve(&task.task_type);

        info!(
            worker_id = %self.worker_id,
            task_id = %task.id,
            task_type = %task.task_type,
            attempt = task.retries + 1,
            "Executing task"
        );

        let started = Instant::now();
        let result = handler.handle(task.payload).await;
        let elapsed = started.elapsed();

        match result {
            Ok(value) => {
                self.state.record_processed();
                if let Err(e) = self.client.complete(&task.id, value).await {
                    error!(task_id = %task.id, "Failed to report completion: {}", e);
                }
                if let Some(reporter) = &self.reporter {
                    reporter.task_completed();
                }

                info!(
                    worker_id = %self.worker_id,
                    task_id = %task.id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Task completed"
                );
                ExecutionOutcome::Completed {
                    task_id: task.id,
                    elapsed,
                }
            }
            Err(handler_error) => {
                let message = handler_error.to_string();
                self.state.record_failed();
                if let Err(e) = self.client.fail(&task.id, &message).await {
                    error!(task_id = %task.id, "Failed to report failure: {}", e);
                }
                if let Some(reporter) = &self.reporter {
                    reporter.task_failed();
                }

                warn!(
                    worker_id = %self.worker_id,
                    task_id = %task.id,
                    error = %message,
                    "Task handler failed"
                );
                ExecutionOutcome::Failed {
                    task_id: task.id,
                    error: message,
                }
            }
        }
    }
}
