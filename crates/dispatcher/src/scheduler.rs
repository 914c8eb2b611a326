use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use taskqueue_core::{
    models::{
        EventKind, NewTask, SchedulerEvent, SchedulerStats, Task, TaskId, TaskStatus, TaskSummary,
        WorkerHeartbeat, WorkerRecord, WorkerRegistration,
    },
    SchedulerConfig, SchedulerError, SchedulerResult,
};

use crate::event_bus::EventBus;
use crate::queue::PriorityQueueSet;
use crate::retry_service::{RetryConfig, RetryDecision};
use crate::stats::StatsCounters;

struct TaskEntry {
    task: Task,
    /// 出队时刻，用于计算处理耗时
    dispatched_at: Option<Instant>,
}

/// 调度器全部可变状态，始终在同一把锁内修改
#[derive(Default)]
struct SchedulerState {
    tasks: HashMap<TaskId, TaskEntry>,
    queues: PriorityQueueSet,
    in_flight: HashSet<TaskId>,
    workers: HashMap<String, WorkerRecord>,
    counters: StatsCounters,
}

struct Shared {
    state: Mutex<SchedulerState>,
    events: EventBus,
    work_available: Notify,
    retry: RetryConfig,
}

/// 批量提交结果
#[derive(Debug, Clone)]
pub struct BatchSubmission {
    /// 被接受的任务数（缺少类型的条目会被跳过）
    pub accepted: usize,
    pub tasks: Vec<TaskSummary>,
}

/// 队列管理器
///
/// 持有任务存储、三条优先级通道、处理中集合、Worker 记录与统计计数器。
/// 所有操作都在同一个互斥锁内执行到底，因此"取任务 + 修改状态"以及
/// 完成/失败处理在多线程下也是原子的。
///
/// `QueueManager` 克隆成本很低（内部为 `Arc`），所有调用方共享同一个实例。
#[derive(Clone)]
pub struct QueueManager {
    shared: Arc<Shared>,
}

impl QueueManager {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self::with_retry_config(RetryConfig::from(config), config.event_buffer_size)
    }

    pub fn with_retry_config(retry: RetryConfig, event_buffer_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState::default()),
                events: EventBus::new(event_buffer_size),
                work_available: Notify::new(),
                retry,
            }),
        }
    }

    /// 提交单个任务，追加到对应优先级通道的队尾
    pub async fn submit(&self, request: NewTask) -> SchedulerResult<TaskSummary> {
        if !request.has_type() {
            return Err(SchedulerError::InvalidTaskParams(
                "任务类型不能为空".to_string(),
            ));
        }

        let summary = {
            let mut state = self.shared.state.lock().await;
            self.shared.enqueue_new(&mut state, request)
        };
        self.shared.work_available.notify_waiters();
        Ok(summary)
    }

    /// 批量提交任务，缺少类型的条目被静默跳过
    pub async fn submit_batch(&self, requests: Vec<NewTask>) -> SchedulerResult<BatchSubmission> {
        if requests.is_empty() {
            return Err(SchedulerError::InvalidTaskParams(
                "批量提交的任务列表不能为空".to_string(),
            ));
        }

        let total = requests.len();
        let tasks: Vec<TaskSummary> = {
            let mut state = self.shared.state.lock().await;
            requests
                .into_iter()
                .filter(|request| request.has_type())
                .map(|request| self.shared.enqueue_new(&mut state, request))
                .collect()
        };

        if !tasks.is_empty() {
            self.shared.work_available.notify_waiters();
        }

        info!(
            accepted = tasks.len(),
            skipped = total - tasks.len(),
            "Batch submission processed"
        );

        Ok(BatchSubmission {
            accepted: tasks.len(),
            tasks,
        })
    }

    /// 为指定 Worker 取出下一个任务
    ///
    /// 按 high、normal、low 顺序扫描通道，返回最早入队的任务并标记为处理中。
    /// 所有通道为空时返回 `None`，调用方稍后重试即可。
    pub async fn fetch_next(&self, worker_id: &str) -> Option<Task> {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        while let Some((_, id)) = state.queues.pop_next() {
            let Some(entry) = state.tasks.get_mut(&id) else {
                warn!(task_id = %id, "Queued task missing from store, skipping");
                continue;
            };

            if let Err(e) = entry.task.transition(TaskStatus::Processing, "fetch") {
                warn!(task_id = %id, "Skipping queued task: {}", e);
                continue;
            }

            entry.task.worker_id = Some(worker_id.to_string());
            entry.task.started_at = Some(Utc::now());
            entry.dispatched_at = Some(Instant::now());
            state.in_flight.insert(id.clone());
            state.counters.record_dispatched();
            gauge!("taskqueue_queue_depth").set(state.queues.total_len() as f64);

            self.shared
                .events
                .publish(SchedulerEvent::task(EventKind::TaskProcessing, &entry.task));
            debug!(
                task_id = %id,
                worker_id,
                priority = %entry.task.priority,
                "Task dispatched"
            );

            return Some(entry.task.clone());
        }

        None
    }

    /// 标记任务完成
    ///
    /// 未知任务返回 `TaskNotFound`，不修改任何计数器。
    pub async fn complete(&self, task_id: &str, result: serde_json::Value) -> SchedulerResult<Task> {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        let entry = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| SchedulerError::task_not_found(task_id))?;
        entry.task.transition(TaskStatus::Completed, "complete")?;

        entry.task.completed_at = Some(Utc::now());
        entry.task.result = Some(result);
        let duration_ms = entry
            .dispatched_at
            .take()
            .map(|started| started.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or_default();

        state.in_flight.remove(task_id);
        state.counters.record_completed(duration_ms);
        if let Some(worker) = entry
            .task
            .worker_id
            .as_ref()
            .and_then(|worker_id| state.workers.get_mut(worker_id))
        {
            worker.tasks_processed += 1;
        }
        counter!("taskqueue_tasks_completed_total").increment(1);

        self.shared
            .events
            .publish(SchedulerEvent::task(EventKind::TaskCompleted, &entry.task));
        info!(
            task_id,
            task_type = %entry.task.task_type,
            duration_ms,
            "Task completed"
        );

        Ok(entry.task.clone())
    }

    /// 标记任务失败
    ///
    /// 重试次数未用尽时任务进入 `Retrying`，在 `base_delay * 2^retries` 之后
    /// 重新追加到原通道队尾；否则进入终态 `Failed`。
    pub async fn fail(&self, task_id: &str, error_message: &str) -> SchedulerResult<Task> {
        let mut guard = self.shared.state.lock().await;
        let state = &mut *guard;

        let entry = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| SchedulerError::task_not_found(task_id))?;

        let decision = self
            .shared
            .retry
            .decide(entry.task.retries, entry.task.max_retries);
        let next_status = match decision {
            RetryDecision::Retry { .. } => TaskStatus::Retrying,
            RetryDecision::Exhausted => TaskStatus::Failed,
        };
        entry.task.transition(next_status, "fail")?;

        state.in_flight.remove(task_id);
        entry.dispatched_at = None;
        entry.task.error = Some(error_message.to_string());
        let now = Utc::now();

        match decision {
            RetryDecision::Retry { delay, attempt } => {
                entry.task.retries = attempt;
                entry.task.next_retry_at = chrono::Duration::from_std(delay)
                    .ok()
                    .and_then(|delay| now.checked_add_signed(delay));
                state.counters.record_retry_scheduled();

                self.shared
                    .events
                    .publish(SchedulerEvent::task(EventKind::TaskRetrying, &entry.task));
                warn!(
                    task_id,
                    attempt,
                    max_retries = entry.task.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = error_message,
                    "Task failed, retry scheduled"
                );

                self.schedule_requeue(task_id.to_string(), delay);
            }
            RetryDecision::Exhausted => {
                entry.task.failed_at = Some(now);
                state.counters.record_failed();
                counter!("taskqueue_tasks_failed_total").increment(1);

                self.shared
                    .events
                    .publish(SchedulerEvent::task(EventKind::TaskFailed, &entry.task));
                error!(
                    task_id,
                    retries = entry.task.retries,
                    error = error_message,
                    "Task failed permanently"
                );
            }
        }

        Ok(entry.task.clone())
    }

    /// 延迟重新入队，定时器一旦安排便不可取消
    fn schedule_requeue(&self, task_id: TaskId, delay: Duration) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.requeue(&task_id).await;
        });
    }

    /// 查询任务快照
    pub async fn get_status(&self, task_id: &str) -> Option<Task> {
        let state = self.shared.state.lock().await;
        state.tasks.get(task_id).map(|entry| entry.task.clone())
    }

    /// 统计快照：增量计数器 + 当前通道长度、处理中数量、活跃 Worker 数
    pub async fn stats(&self) -> SchedulerStats {
        let state = self.shared.state.lock().await;
        state.counters.snapshot(
            state.queues.lengths(),
            state.in_flight.len(),
            state.workers.len(),
        )
    }

    /// 清空所有通道、处理中集合、任务存储并重置计数器
    ///
    /// Worker 记录不受影响。
    pub async fn clear_all(&self) {
        let mut state = self.shared.state.lock().await;
        let cleared = state.tasks.len();

        state.tasks.clear();
        state.queues.clear();
        state.in_flight.clear();
        state.counters.reset();
        gauge!("taskqueue_queue_depth").set(0.0);

        info!(cleared_tasks = cleared, "All queues cleared");
    }

    /// 注册 Worker，同一ID重复注册时替换旧记录
    pub async fn register_worker(&self, registration: WorkerRegistration) -> WorkerRecord {
        let record = WorkerRecord::new(registration);
        let mut state = self.shared.state.lock().await;

        if state
            .workers
            .insert(record.id.clone(), record.clone())
            .is_some()
        {
            warn!(worker_id = %record.id, "Worker re-registered, replacing stale record");
        }
        gauge!("taskqueue_active_workers").set(state.workers.len() as f64);

        self.shared
            .events
            .publish(SchedulerEvent::worker(EventKind::WorkerRegistered, &record));
        info!(worker_id = %record.id, pid = record.pid, "Worker registered");

        record
    }

    pub async fn heartbeat(&self, heartbeat: WorkerHeartbeat) -> SchedulerResult<()> {
        let mut state = self.shared.state.lock().await;
        let worker = state
            .workers
            .get_mut(&heartbeat.worker_id)
            .ok_or_else(|| SchedulerError::worker_not_found(heartbeat.worker_id.clone()))?;

        worker.apply_heartbeat(heartbeat);
        debug!(
            worker_id = %worker.id,
            status = ?worker.status,
            current_task = ?worker.current_task_id,
            "Heartbeat received"
        );
        Ok(())
    }

    pub async fn unregister_worker(&self, worker_id: &str) -> SchedulerResult<WorkerRecord> {
        let mut state = self.shared.state.lock().await;
        let record = state
            .workers
            .remove(worker_id)
            .ok_or_else(|| SchedulerError::worker_not_found(worker_id))?;
        gauge!("taskqueue_active_workers").set(state.workers.len() as f64);

        self.shared
            .events
            .publish(SchedulerEvent::worker(EventKind::WorkerUnregistered, &record));
        info!(
            worker_id,
            tasks_processed = record.tasks_processed,
            "Worker unregistered"
        );

        Ok(record)
    }

    /// 当前已注册的 Worker，按ID排序
    pub async fn active_workers(&self) -> Vec<WorkerRecord> {
        let state = self.shared.state.lock().await;
        let mut workers: Vec<WorkerRecord> = state.workers.values().cloned().collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        workers
    }

    /// 订阅生命周期事件
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.shared.events.subscribe()
    }

    /// 等待下一次有任务进入通道
    ///
    /// 只唤醒调用时已在等待的一方，调用方仍需配合超时轮询。
    pub async fn wait_for_work(&self) {
        self.shared.work_available.notified().await;
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default())
    }
}

impl Shared {
    fn enqueue_new(&self, state: &mut SchedulerState, request: NewTask) -> TaskSummary {
        let task = Task::new(request, self.retry.default_max_retries);

        state.queues.push_back(task.priority, task.id.clone());
        state.counters.record_submitted();
        counter!("taskqueue_tasks_submitted_total").increment(1);
        gauge!("taskqueue_queue_depth").set(state.queues.total_len() as f64);

        self.events
            .publish(SchedulerEvent::task(EventKind::TaskCreated, &task));
        debug!(
            task_id = %task.id,
            task_type = %task.task_type,
            priority = %task.priority,
            "Task submitted"
        );

        let summary = task.summary();
        state.tasks.insert(
            task.id.clone(),
            TaskEntry {
                task,
                dispatched_at: None,
            },
        );
        summary
    }

    /// 重试延迟结束后把任务放回原通道队尾
    ///
    /// 任务已被清空或不再处于 `Retrying` 时丢弃本次回调。
    async fn requeue(&self, task_id: &str) {
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let Some(entry) = state.tasks.get_mut(task_id) else {
                debug!(task_id, "Retry timer fired for a cleared task, ignoring");
                return;
            };
            if entry.task.status != TaskStatus::Retrying {
                debug!(task_id, status = %entry.task.status, "Stale retry timer, ignoring");
                return;
            }
            if let Err(e) = entry.task.transition(TaskStatus::Pending, "requeue") {
                warn!(task_id, "Failed to requeue task: {}", e);
                return;
            }

            entry.task.worker_id = None;
            entry.task.next_retry_at = None;
            state.queues.push_back(entry.task.priority, task_id.to_string());
            state.counters.record_requeued();
            counter!("taskqueue_tasks_retried_total").increment(1);
            gauge!("taskqueue_queue_depth").set(state.queues.total_len() as f64);

            info!(
                task_id,
                retries = entry.task.retries,
                priority = %entry.task.priority,
                "Task requeued after backoff"
            );
        }

        self.work_available.notify_waiters();
    }
}
