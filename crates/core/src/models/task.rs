use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{SchedulerError, SchedulerResult};

/// 任务唯一标识（UUID v4 字符串）
pub type TaskId = String;

/// 任务定义
///
/// 表示队列中的一个工作单元，由调度器独占管理其生命周期。
///
/// # 字段说明
///
/// - `id`: 提交时生成的唯一标识
/// - `task_type`: 任务类型，用于查找对应的处理器
/// - `payload`: 任务参数，JSON 格式，对调度器不透明
/// - `priority`: 优先级通道（high/normal/low）
/// - `status`: 生命周期状态，只能按状态机单调迁移
/// - `retries` / `max_retries`: 已重试次数与重试上限
/// - `worker_id`: 处理中时所属的 Worker
/// - `error`: 最近一次失败的错误信息
/// - `result`: 完成时处理器返回的结果
///
/// # 使用示例
///
/// ```rust
/// use taskqueue_core::models::{NewTask, Task, TaskPriority, TaskStatus};
/// use serde_json::json;
///
/// let task = Task::new(
///     NewTask::new("email", json!({"to": "ops@example.com"})).with_priority(TaskPriority::High),
///     3,
/// );
/// assert_eq!(task.status, TaskStatus::Pending);
/// assert_eq!(task.max_retries, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: serde_json::Value,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub retries: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
}

/// 任务优先级
///
/// 三个通道之间严格按 `High > Normal > Low` 的顺序出队。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    #[default]
    Normal,
    Low,
}

impl TaskPriority {
    /// 按出队先后排列的全部优先级
    pub const ALL: [TaskPriority; 3] = [TaskPriority::High, TaskPriority::Normal, TaskPriority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(TaskPriority::High),
            "normal" => Ok(TaskPriority::Normal),
            "low" => Ok(TaskPriority::Low),
            other => Err(SchedulerError::InvalidTaskParams(format!(
                "未知的优先级: {other}"
            ))),
        }
    }
}

/// 任务状态
///
/// 状态机：`Pending → Processing → {Completed | Retrying | Failed}`，
/// `Retrying → Pending`。`Completed` 与 `Failed` 为终态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Retrying => "retrying",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// 检查状态迁移是否合法
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Retrying)
                | (TaskStatus::Processing, TaskStatus::Failed)
                | (TaskStatus::Retrying, TaskStatus::Pending)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务提交请求
///
/// `task_type` 缺失时反序列化为空字符串，由提交接口负责校验。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    #[serde(rename = "type", default)]
    pub task_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default, rename = "maxRetries", alias = "max_retries")]
    pub max_retries: Option<u32>,
}

impl NewTask {
    pub fn new(task_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            task_type: task_type.into(),
            payload,
            priority: None,
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// 是否携带了非空的任务类型
    pub fn has_type(&self) -> bool {
        !self.task_type.trim().is_empty()
    }
}

/// 任务摘要，提交接口的返回值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSummary {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// 根据提交请求创建新任务，初始状态为 `Pending`
    pub fn new(request: NewTask, default_max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            task_type: request.task_type,
            payload: request.payload,
            priority: request.priority.unwrap_or_default(),
            status: TaskStatus::Pending,
            retries: 0,
            max_retries: request.max_retries.unwrap_or(default_max_retries),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            failed_at: None,
            next_retry_at: None,
            worker_id: None,
            error: None,
            result: None,
        }
    }

    /// 按状态机迁移到下一个状态，非法迁移返回错误且不修改任务
    pub fn transition(&mut self, next: TaskStatus, action: &'static str) -> SchedulerResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulerError::InvalidStateTransition {
                id: self.id.clone(),
                from: self.status,
                action,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            task_type: self.task_type.clone(),
            priority: self.priority,
            status: self.status,
            created_at: self.created_at,
        }
    }
}
