use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use taskqueue_core::models::NewTask;
use taskqueue_core::AppConfig;
use taskqueue_dispatcher::{BatchSubmission, QueueManager};
use taskqueue_worker::{
    HandlerError, HandlerFn, HandlerRegistry, ServiceLauncher, ShutdownOutcome, WorkerSupervisor,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 主应用程序
///
/// 持有唯一的 [`QueueManager`] 实例，所有 Worker 与提交入口共享它。
pub struct Application {
    config: AppConfig,
    manager: QueueManager,
    registry: Arc<HandlerRegistry>,
}

impl Application {
    pub fn new(config: AppConfig, registry: HandlerRegistry) -> Self {
        info!(
            workers = config.supervisor.worker_count,
            handlers = ?registry.task_types(),
            "初始化应用程序"
        );
        let manager = QueueManager::new(&config.scheduler);

        Self {
            config,
            manager,
            registry: Arc::new(registry),
        }
    }

    pub fn queue_manager(&self) -> &QueueManager {
        &self.manager
    }

    /// 从 JSON 文件批量提交任务，文件内容为任务数组
    pub async fn submit_from_file(&self, path: &Path) -> Result<BatchSubmission> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("读取任务文件失败: {}", path.display()))?;
        let tasks: Vec<NewTask> = serde_json::from_str(&contents)
            .with_context(|| format!("解析任务文件失败: {}", path.display()))?;

        let batch = self
            .manager
            .submit_batch(tasks)
            .await
            .with_context(|| format!("提交任务文件失败: {}", path.display()))?;
        info!(
            accepted = batch.accepted,
            file = %path.display(),
            "任务文件已提交"
        );
        Ok(batch)
    }

    /// 订阅生命周期事件并以 debug 级别输出，直到收到关闭信号
    pub fn spawn_event_logger(&self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let mut events = self.manager.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => debug!(
                            kind = %event.kind,
                            subject = %event.subject_id(),
                            "Scheduler event"
                        ),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event logger lagging, events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    }

    /// 运行 Worker 池直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<ShutdownOutcome> {
        let launcher = ServiceLauncher::new(
            self.manager.clone(),
            Arc::clone(&self.registry),
            self.config.worker.clone(),
        );
        let supervisor = WorkerSupervisor::new(self.config.supervisor.clone(), Arc::new(launcher));

        let outcome = supervisor.run(shutdown_rx).await;

        let stats = self.manager.stats().await;
        info!(
            created = stats.tasks_created,
            completed = stats.completed_tasks,
            failed = stats.failed_tasks,
            pending = stats.pending_tasks,
            processing = stats.processing_tasks,
            queued = stats.queue_lengths.total(),
            avg_processing_time_ms = stats.avg_processing_time_ms,
            "最终队列统计"
        );
        Ok(outcome)
    }
}

/// 内置处理器：`echo` 原样返回负载，`sleep` 等待 `ms` 毫秒，`fail` 总是失败
pub fn builtin_handlers() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register(
        "echo",
        HandlerFn::new(|payload: Value| async move { Ok(payload) }),
    );
    registry.register(
        "sleep",
        HandlerFn::new(|payload: Value| async move {
            let Some(ms) = payload.get("ms").and_then(Value::as_u64) else {
                return Err(HandlerError::InvalidPayload("缺少 ms 字段".to_string()));
            };
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(json!({ "slept_ms": ms }))
        }),
    );
    registry.register(
        "fail",
        HandlerFn::new(|payload: Value| async move {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("任务被配置为失败");
            Err(HandlerError::failed(message))
        }),
    );

    registry
}
