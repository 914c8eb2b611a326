use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use taskqueue_core::models::WorkerRegistration;
use taskqueue_core::WorkerConfig;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use super::{HeartbeatManager, SchedulerClient, TaskExecutionManager, WorkerState};

/// Worker 主循环：注册、心跳、轮询取任务、执行、注销
pub struct WorkerLifecycle {
    worker_id: String,
    pid: u32,
    hostname: String,
    client: Arc<dyn SchedulerClient>,
    execution: TaskExecutionManager,
    heartbeat: HeartbeatManager,
    state: Arc<WorkerState>,
    config: WorkerConfig,
    running: AtomicBool,
}

impl WorkerLifecycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: String,
        pid: u32,
        hostname: String,
        client: Arc<dyn SchedulerClient>,
        execution: TaskExecutionManager,
        heartbeat: HeartbeatManager,
        state: Arc<WorkerState>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            worker_id,
            pid,
            hostname,
            client,
            execution,
            heartbeat,
            state,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn state(&self) -> &Arc<WorkerState> {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn mark_running(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    /// 请求停止，循环在下一次迭代边界退出，正在执行的任务会先完成
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 运行直到 `request_stop` 或收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(worker_id = %self.worker_id, pid = self.pid, "Worker starting");

        let registration = WorkerRegistration {
            worker_id: self.worker_id.clone(),
            pid: self.pid,
            hostname: self.hostname.clone(),
        };
        if let Err(e) = self.client.register(registration).await {
            warn!(
                worker_id = %self.worker_id,
                "Failed to register with scheduler, continuing startup: {}", e
            );
        }

        let heartbeat = self
            .heartbeat
            .start_heartbeat_task(shutdown_rx.resubscribe());

        while !self.stop_requested(&mut shutdown_rx) {
            match self.client.fetch_next(&self.worker_id).await {
                Ok(Some(task)) => {
                    self.execution.execute(task).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = sleep(self.config.poll_interval()) => {}
                        _ = self.client.wait_for_work() => {
                            trace!(worker_id = %self.worker_id, "Woken by new work");
                        }
                        _ = shutdown_rx.recv() => break,
                    }
                }
                Err(e) => {
                    warn!(worker_id = %self.worker_id, "Failed to fetch task: {}", e);
                    tokio::select! {
                        _ = sleep(self.config.error_backoff()) => {}
                        _ = shutdown_rx.recv() => break,
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        heartbeat.stop();

        if let Err(e) = self.client.unregister(&self.worker_id).await {
            warn!(worker_id = %self.worker_id, "Failed to unregister from scheduler: {}", e);
        }

        info!(
            worker_id = %self.worker_id,
            tasks_processed = self.state.tasks_processed(),
            tasks_failed = self.state.tasks_failed(),
            "Worker stopped"
        );
    }

    fn stop_requested(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            debug!(worker_id = %self.worker_id, "Stop requested");
            return true;
        }
        !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
    }
}
