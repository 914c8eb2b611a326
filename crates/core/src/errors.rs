use thiserror::Error;

use crate::models::TaskStatus;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },

    #[error("Worker未找到: {id}")]
    WorkerNotFound { id: String },

    #[error("任务 {id} 处于 {from} 状态，无法执行 {action}")]
    InvalidStateTransition {
        id: String,
        from: TaskStatus,
        action: &'static str,
    },

    #[error("无效的任务参数: {0}")]
    InvalidTaskParams(String),

    #[error("调度器连接错误: {0}")]
    Transport(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// 是否为"对象不存在"类错误（任务或Worker）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchedulerError::TaskNotFound { .. } | SchedulerError::WorkerNotFound { .. }
        )
    }

    pub fn task_not_found(id: impl Into<String>) -> Self {
        SchedulerError::TaskNotFound { id: id.into() }
    }

    pub fn worker_not_found(id: impl Into<String>) -> Self {
        SchedulerError::WorkerNotFound { id: id.into() }
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        assert!(SchedulerError::task_not_found("t-1").is_not_found());
        assert!(SchedulerError::worker_not_found("worker-0").is_not_found());
        assert!(!SchedulerError::Transport("down".to_string()).is_not_found());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = SchedulerError::InvalidStateTransition {
            id: "t-1".to_string(),
            from: TaskStatus::Pending,
            action: "complete",
        };
        assert_eq!(err.to_string(), "任务 t-1 处于 pending 状态，无法执行 complete");
    }
}
