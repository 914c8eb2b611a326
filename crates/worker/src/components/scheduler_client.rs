use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use taskqueue_core::models::{Task, WorkerHeartbeat, WorkerRegistration};
use taskqueue_core::SchedulerResult;
use taskqueue_dispatcher::QueueManager;

/// Worker 与调度器之间的调用接口
///
/// Worker 只通过这些操作访问调度器，从不直接接触队列内部结构。
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn register(&self, registration: WorkerRegistration) -> SchedulerResult<()>;

    async fn heartbeat(&self, heartbeat: WorkerHeartbeat) -> SchedulerResult<()>;

    async fn unregister(&self, worker_id: &str) -> SchedulerResult<()>;

    /// 取下一个任务，没有可执行任务时返回 `Ok(None)`
    async fn fetch_next(&self, worker_id: &str) -> SchedulerResult<Option<Task>>;

    async fn complete(&self, task_id: &str, result: Value) -> SchedulerResult<()>;

    async fn fail(&self, task_id: &str, error: &str) -> SchedulerResult<()>;

    /// 等待新任务到达的信号，不支持时永远挂起，由调用方的轮询超时兜底
    async fn wait_for_work(&self) {
        std::future::pending::<()>().await
    }
}

/// 直接调用同进程内 [`QueueManager`] 的客户端
#[derive(Clone)]
pub struct LocalSchedulerClient {
    manager: QueueManager,
}

impl LocalSchedulerClient {
    pub fn new(manager: QueueManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl SchedulerClient for LocalSchedulerClient {
    async fn register(&self, registration: WorkerRegistration) -> SchedulerResult<()> {
        self.manager.register_worker(registration).await;
        Ok(())
    }

    async fn heartbeat(&self, heartbeat: WorkerHeartbeat) -> SchedulerResult<()> {
        self.manager.heartbeat(heartbeat).await
    }

    async fn unregister(&self, worker_id: &str) -> SchedulerResult<()> {
        self.manager.unregister_worker(worker_id).await.map(|_| ())
    }

    async fn fetch_next(&self, worker_id: &str) -> SchedulerResult<Option<Task>> {
        Ok(self.manager.fetch_next(worker_id).await)
    }

    async fn complete(&self, task_id: &str, result: Value) -> SchedulerResult<()> {
        self.manager.complete(task_id, result).await.map(|_| ())
    }

    async fn fail(&self, task_id: &str, error: &str) -> SchedulerResult<()> {
        let task = self.manager.fail(task_id, error).await?;
        debug!(task_id, status = %task.status, "Failure reported");
        Ok(())
    }

    async fn wait_for_work(&self) {
        self.manager.wait_for_work().await
    }
}
