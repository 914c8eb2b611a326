use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Task, TaskId, TaskPriority, TaskStatus, WorkerRecord};

/// 生命周期事件类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[serde(rename = "task:created")]
    TaskCreated,
    #[serde(rename = "task:processing")]
    TaskProcessing,
    #[serde(rename = "task:completed")]
    TaskCompleted,
    #[serde(rename = "task:failed")]
    TaskFailed,
    #[serde(rename = "task:retrying")]
    TaskRetrying,
    #[serde(rename = "worker:registered")]
    WorkerRegistered,
    #[serde(rename = "worker:unregistered")]
    WorkerUnregistered,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskCreated => "task:created",
            EventKind::TaskProcessing => "task:processing",
            EventKind::TaskCompleted => "task:completed",
            EventKind::TaskFailed => "task:failed",
            EventKind::TaskRetrying => "task:retrying",
            EventKind::WorkerRegistered => "worker:registered",
            EventKind::WorkerUnregistered => "worker:unregistered",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 事件中携带的任务片段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEventData {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub retries: u32,
    pub max_retries: u32,
    pub worker_id: Option<String>,
    pub error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskEventData {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            task_type: task.task_type.clone(),
            priority: task.priority,
            status: task.status,
            retries: task.retries,
            max_retries: task.max_retries,
            worker_id: task.worker_id.clone(),
            error: task.error.clone(),
            next_retry_at: task.next_retry_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum EventPayload {
    Task(TaskEventData),
    Worker(WorkerRecord),
}

/// 调度器对外发布的生命周期事件
///
/// 事件是"发出即忘"的：调度器不等待确认，慢消费者可能丢失最旧的事件。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl SchedulerEvent {
    pub fn task(kind: EventKind, task: &Task) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            payload: EventPayload::Task(TaskEventData::from(task)),
        }
    }

    pub fn worker(kind: EventKind, worker: &WorkerRecord) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            payload: EventPayload::Worker(worker.clone()),
        }
    }

    /// 事件关联的对象ID（任务ID或Worker ID）
    pub fn subject_id(&self) -> &str {
        match &self.payload {
            EventPayload::Task(task) => &task.id,
            EventPayload::Worker(worker) => &worker.id,
        }
    }
}
