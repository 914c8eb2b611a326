use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// Worker记录
///
/// 由调度器在 Worker 注册时创建，心跳和任务完成时更新，注销时删除。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRecord {
    pub id: String,
    pub status: WorkerStatus,
    pub tasks_processed: u64,
    pub current_task_id: Option<TaskId>,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub pid: u32,
    pub hostname: String,
}

/// Worker状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Busy,
}

/// Worker注册请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegistration {
    pub worker_id: String,
    pub pid: u32,
    pub hostname: String,
}

/// Worker心跳信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub worker_id: String,
    pub status: WorkerStatus,
    pub current_task_id: Option<TaskId>,
    pub timestamp: DateTime<Utc>,
}

impl WorkerRecord {
    /// 创建新的Worker记录，初始状态为空闲
    pub fn new(registration: WorkerRegistration) -> Self {
        let now = Utc::now();
        Self {
            id: registration.worker_id,
            status: WorkerStatus::Idle,
            tasks_processed: 0,
            current_task_id: None,
            started_at: now,
            last_heartbeat: now,
            pid: registration.pid,
            hostname: registration.hostname,
        }
    }

    /// 更新心跳信息
    pub fn apply_heartbeat(&mut self, heartbeat: WorkerHeartbeat) {
        self.status = heartbeat.status;
        self.current_task_id = heartbeat.current_task_id;
        self.last_heartbeat = heartbeat.timestamp;
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.status, WorkerStatus::Busy)
    }
}
