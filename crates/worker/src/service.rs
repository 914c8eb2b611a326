use std::sync::Arc;

use taskqueue_core::{SchedulerError, SchedulerResult, WorkerConfig};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::components::{
    HeartbeatManager, SchedulerClient, TaskExecutionManager, WorkerLifecycle, WorkerState,
};
use crate::handler_registry::HandlerRegistry;
use crate::supervisor::WorkerReporter;

/// Worker服务构建器
pub struct WorkerServiceBuilder {
    worker_id: String,
    client: Arc<dyn SchedulerClient>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    pid: u32,
    hostname: String,
    reporter: Option<WorkerReporter>,
}

impl WorkerServiceBuilder {
    pub fn new(worker_id: impl Into<String>, client: Arc<dyn SchedulerClient>) -> Self {
        Self {
            worker_id: worker_id.into(),
            client,
            registry: Arc::new(HandlerRegistry::new()),
            config: WorkerConfig::default(),
            pid: std::process::id(),
            hostname: hostname::get()
                .unwrap_or_else(|_| "unknown".into())
                .to_string_lossy()
                .to_string(),
            reporter: None,
        }
    }

    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// 向监督者汇报任务结果
    pub fn reporter(mut self, reporter: WorkerReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> WorkerService {
        let state = WorkerState::new();
        let execution = TaskExecutionManager::new(
            self.worker_id.clone(),
            Arc::clone(&self.client),
            self.registry,
            Arc::clone(&state),
            self.reporter,
        );
        let heartbeat = HeartbeatManager::new(
            self.worker_id.clone(),
            Arc::clone(&self.client),
            Arc::clone(&state),
            self.config.heartbeat_interval(),
        );
        let lifecycle = WorkerLifecycle::new(
            self.worker_id,
            self.pid,
            self.hostname,
            self.client,
            execution,
            heartbeat,
            state,
            self.config,
        );
        let (shutdown_tx, _) = broadcast::channel(1);

        WorkerService {
            lifecycle: Arc::new(lifecycle),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }
}

/// Worker服务
///
/// `start` 在后台任务中运行主循环，`stop` 协作式停止并等待其退出；
/// `run` 在当前任务中运行，直到传入的关闭信号触发。
pub struct WorkerService {
    lifecycle: Arc<WorkerLifecycle>,
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerService {
    pub fn builder(
        worker_id: impl Into<String>,
        client: Arc<dyn SchedulerClient>,
    ) -> WorkerServiceBuilder {
        WorkerServiceBuilder::new(worker_id, client)
    }

    pub fn worker_id(&self) -> &str {
        self.lifecycle.worker_id()
    }

    pub fn state(&self) -> Arc<WorkerState> {
        Arc::clone(self.lifecycle.state())
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub async fn start(&self) -> SchedulerResult<()> {
        let mut handle = self.handle.lock().await;
        if !self.lifecycle.mark_running() {
            return Err(SchedulerError::Internal(format!(
                "Worker {} 已经在运行",
                self.worker_id()
            )));
        }

        let lifecycle = Arc::clone(&self.lifecycle);
        let shutdown_rx = self.shutdown_tx.subscribe();
        *handle = Some(tokio::spawn(async move {
            lifecycle.run(shutdown_rx).await;
        }));

        info!(worker_id = %self.worker_id(), "Worker service started");
        Ok(())
    }

    /// 停止 Worker 并等待正在执行的任务完成
    pub async fn stop(&self) -> SchedulerResult<()> {
        let Some(handle) = self.handle.lock().await.take() else {
            return Ok(());
        };

        self.lifecycle.request_stop();
        if self.shutdown_tx.send(()).is_err() {
            warn!(worker_id = %self.worker_id(), "Worker loop already exited");
        }

        handle
            .await
            .map_err(|e| SchedulerError::Internal(format!("Worker 任务异常退出: {e}")))
    }

    /// 在当前任务中运行主循环
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> SchedulerResult<()> {
        if !self.lifecycle.mark_running() {
            return Err(SchedulerError::Internal(format!(
                "Worker {} 已经在运行",
                self.worker_id()
            )));
        }
        self.lifecycle.run(shutdown_rx).await;
        Ok(())
    }
}
