//! Worker 池监督者
//!
//! 监督者持有 N 个 Worker 单元的元数据（序号、pid、启动时间、完成/失败计数），
//! 只通过消息通道和停止广播与单元交互：
//!
//! - 单元意外退出后，在 `respawn_delay` 之后以相同序号重新拉起
//! - 每隔 `stats_interval` 记录一次运行统计，并通过 watch 通道发布快照
//! - 收到关闭信号后停止重启，广播停止请求，最多等待 `shutdown_timeout`，
//!   超时则强制终止剩余单元

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskqueue_core::{SupervisorConfig, WorkerConfig};
use taskqueue_dispatcher::QueueManager;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::components::LocalSchedulerClient;
use crate::handler_registry::HandlerRegistry;
use crate::service::WorkerServiceBuilder;

/// Worker 单元发给监督者的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    TaskCompleted { index: usize, generation: u64 },
    TaskFailed { index: usize, generation: u64 },
    Exited { index: usize, generation: u64, panicked: bool },
    Respawn { index: usize },
}

/// Worker 单元用来向监督者汇报的句柄
#[derive(Debug, Clone)]
pub struct WorkerReporter {
    index: usize,
    generation: u64,
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl WorkerReporter {
    pub fn new(index: usize, generation: u64, tx: mpsc::UnboundedSender<WorkerMessage>) -> Self {
        Self {
            index,
            generation,
            tx,
        }
    }

    pub fn task_completed(&self) {
        self.send(WorkerMessage::TaskCompleted {
            index: self.index,
            generation: self.generation,
        });
    }

    pub fn task_failed(&self) {
        self.send(WorkerMessage::TaskFailed {
            index: self.index,
            generation: self.generation,
        });
    }

    fn send(&self, message: WorkerMessage) {
        if self.tx.send(message).is_err() {
            debug!(index = self.index, "Supervisor gone, dropping worker report");
        }
    }
}

/// 已启动的 Worker 单元
pub struct WorkerSpawn {
    pub handle: JoinHandle<()>,
    pub pid: u32,
}

/// 启动 Worker 单元的方式
pub trait WorkerLauncher: Send + Sync + 'static {
    fn launch(
        &self,
        worker_id: String,
        reporter: WorkerReporter,
        stop_rx: broadcast::Receiver<()>,
    ) -> WorkerSpawn;
}

/// 在当前运行时内以 tokio 任务形式启动 [`WorkerService`](crate::WorkerService)
pub struct ServiceLauncher {
    manager: QueueManager,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
}

impl ServiceLauncher {
    pub fn new(manager: QueueManager, registry: Arc<HandlerRegistry>, config: WorkerConfig) -> Self {
        Self {
            manager,
            registry,
            config,
        }
    }
}

impl WorkerLauncher for ServiceLauncher {
    fn launch(
        &self,
        worker_id: String,
        reporter: WorkerReporter,
        stop_rx: broadcast::Receiver<()>,
    ) -> WorkerSpawn {
        let client = Arc::new(LocalSchedulerClient::new(self.manager.clone()));
        let service = WorkerServiceBuilder::new(worker_id, client)
            .registry(Arc::clone(&self.registry))
            .config(self.config.clone())
            .reporter(reporter)
            .build();

        let handle = tokio::spawn(async move {
            if let Err(e) = service.run(stop_rx).await {
                error!(worker_id = %service.worker_id(), "Worker exited with error: {}", e);
            }
        });

        WorkerSpawn {
            handle,
            pid: std::process::id(),
        }
    }
}

/// 单个 Worker 单元的公开信息
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerUnitInfo {
    pub index: usize,
    pub worker_id: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
}

/// Worker 池快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolSnapshot {
    pub expected_workers: usize,
    pub active_workers: usize,
    pub total_completed: u64,
    pub total_failed: u64,
    pub restarts: u64,
    pub uptime: Duration,
    pub workers: Vec<WorkerUnitInfo>,
}

/// 关闭结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// 所有单元在超时前退出
    Clean,
    /// 超时，强制终止了 `aborted` 个单元
    TimedOut { aborted: usize },
}

struct WorkerUnit {
    info: WorkerUnitInfo,
    generation: u64,
    abort: AbortHandle,
}

pub struct WorkerSupervisor {
    config: SupervisorConfig,
    launcher: Arc<dyn WorkerLauncher>,
    units: BTreeMap<usize, WorkerUnit>,
    tx: mpsc::UnboundedSender<WorkerMessage>,
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
    stop_tx: broadcast::Sender<()>,
    snapshot_tx: watch::Sender<PoolSnapshot>,
    next_generation: u64,
    total_completed: u64,
    total_failed: u64,
    restarts: u64,
    shutting_down: bool,
    started_at: Instant,
}

impl WorkerSupervisor {
    pub fn new(config: SupervisorConfig, launcher: Arc<dyn WorkerLauncher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = broadcast::channel(1);
        let (snapshot_tx, _) = watch::channel(PoolSnapshot {
            expected_workers: config.worker_count,
            ..Default::default()
        });

        Self {
            config,
            launcher,
            units: BTreeMap::new(),
            tx,
            rx,
            stop_tx,
            snapshot_tx,
            next_generation: 0,
            total_completed: 0,
            total_failed: 0,
            restarts: 0,
            shutting_down: false,
            started_at: Instant::now(),
        }
    }

    /// 订阅 Worker 池快照，需在 `run` 之前调用
    pub fn snapshots(&self) -> watch::Receiver<PoolSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// 启动全部 Worker 单元并监督，直到收到关闭信号
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> ShutdownOutcome {
        self.started_at = Instant::now();
        info!(
            workers = self.config.worker_count,
            "Starting worker supervisor"
        );

        for index in 0..self.config.worker_count {
            self.spawn_unit(index);
        }
        self.publish_snapshot();

        let mut stats_ticker = interval(self.config.stats_interval());
        stats_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        stats_ticker.tick().await;

        loop {
            tokio::select! {
                Some(message) = self.rx.recv() => self.handle_message(message),
                _ = stats_ticker.tick() => self.log_stats(),
                _ = shutdown_rx.recv() => break,
            }
        }

        self.shutdown().await
    }

    fn spawn_unit(&mut self, index: usize) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let worker_id = format!("worker-{index}");

        let reporter = WorkerReporter::new(index, generation, self.tx.clone());
        let spawn = self
            .launcher
            .launch(worker_id.clone(), reporter, self.stop_tx.subscribe());
        let abort = spawn.handle.abort_handle();

        let tx = self.tx.clone();
        let handle = spawn.handle;
        tokio::spawn(async move {
            let panicked = match handle.await {
                Ok(()) => false,
                Err(e) => e.is_panic(),
            };
            let _ = tx.send(WorkerMessage::Exited {
                index,
                generation,
                panicked,
            });
        });

        info!(worker_id = %worker_id, pid = spawn.pid, generation, "Worker unit started");
        self.units.insert(
            index,
            WorkerUnit {
                info: WorkerUnitInfo {
                    index,
                    worker_id,
                    pid: spawn.pid,
                    started_at: Utc::now(),
                    tasks_completed: 0,
                    tasks_failed: 0,
                },
                generation,
                abort,
            },
        );
    }

    fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::TaskCompleted { index, generation } => {
                self.total_completed += 1;
                if let Some(unit) = self.current_unit(index, generation) {
                    unit.info.tasks_completed += 1;
                }
            }
            WorkerMessage::TaskFailed { index, generation } => {
                self.total_failed += 1;
                if let Some(unit) = self.current_unit(index, generation) {
                    unit.info.tasks_failed += 1;
                }
            }
            WorkerMessage::Exited {
                index,
                generation,
                panicked,
            } => {
                if self.current_unit(index, generation).is_none() {
                    debug!(index, generation, "Ignoring exit of stale worker unit");
                    return;
                }
                self.units.remove(&index);

                if self.shutting_down {
                    info!(index, "Worker unit stopped");
                } else {
                    warn!(
                        index,
                        panicked,
                        delay_ms = self.config.respawn_delay().as_millis() as u64,
                        "Worker unit exited unexpectedly, scheduling respawn"
                    );
                    self.schedule_respawn(index);
                }
            }
            WorkerMessage::Respawn { index } => {
                if self.shutting_down || self.units.contains_key(&index) {
                    return;
                }
                self.restarts += 1;
                self.spawn_unit(index);
            }
        }
        self.publish_snapshot();
    }

    fn current_unit(&mut self, index: usize, generation: u64) -> Option<&mut WorkerUnit> {
        self.units
            .get_mut(&index)
            .filter(|unit| unit.generation == generation)
    }

    fn schedule_respawn(&self, index: usize) {
        let tx = self.tx.clone();
        let delay = self.config.respawn_delay();
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(WorkerMessage::Respawn { index });
        });
    }

    fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            expected_workers: self.config.worker_count,
            active_workers: self.units.len(),
            total_completed: self.total_completed,
            total_failed: self.total_failed,
            restarts: self.restarts,
            uptime: self.started_at.elapsed(),
            workers: self.units.values().map(|unit| unit.info.clone()).collect(),
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    fn log_stats(&self) {
        let snapshot = self.snapshot();
        info!(
            uptime_secs = snapshot.uptime.as_secs(),
            active = snapshot.active_workers,
            expected = snapshot.expected_workers,
            completed = snapshot.total_completed,
            failed = snapshot.total_failed,
            restarts = snapshot.restarts,
            "Worker pool stats"
        );
        self.snapshot_tx.send_replace(snapshot);
    }

    async fn shutdown(mut self) -> ShutdownOutcome {
        self.shutting_down = true;
        info!(active = self.units.len(), "Stopping worker units");

        if self.stop_tx.send(()).is_err() {
            debug!("No worker units listening for stop");
        }

        let deadline = sleep(self.config.shutdown_timeout());
        tokio::pin!(deadline);

        while !self.units.is_empty() {
            tokio::select! {
                Some(message) = self.rx.recv() => self.handle_message(message),
                _ = &mut deadline => {
                    let aborted = self.units.len();
                    for unit in self.units.values() {
                        warn!(worker_id = %unit.info.worker_id, "Aborting worker unit");
                        unit.abort.abort();
                    }
                    error!(
                        aborted,
                        timeout_secs = self.config.shutdown_timeout().as_secs(),
                        "Worker shutdown timed out"
                    );
                    self.units.clear();
                    self.publish_snapshot();
                    return ShutdownOutcome::TimedOut { aborted };
                }
            }
        }

        info!(
            completed = self.total_completed,
            failed = self.total_failed,
            restarts = self.restarts,
            "All worker units stopped"
        );
        ShutdownOutcome::Clean
    }
}
