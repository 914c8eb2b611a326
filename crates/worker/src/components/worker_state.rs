use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use taskqueue_core::models::{TaskId, WorkerStatus};

/// Worker 本地状态：当前任务与处理计数
#[derive(Debug, Default)]
pub struct WorkerState {
    current_task: RwLock<Option<TaskId>>,
    tasks_processed: AtomicU64,
    tasks_failed: AtomicU64,
}

impl WorkerState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 标记当前任务，返回的守卫在离开作用域时清除标记（包括 panic 展开）
    pub fn begin_task(self: &Arc<Self>, task_id: &str) -> CurrentTaskGuard {
        self.set_current(Some(task_id.to_string()));
        CurrentTaskGuard {
            state: Arc::clone(self),
        }
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.current_task
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn status(&self) -> WorkerStatus {
        if self.current_task().is_some() {
            WorkerStatus::Busy
        } else {
            WorkerStatus::Idle
        }
    }

    pub fn record_processed(&self) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tasks_processed(&self) -> u64 {
        self.tasks_processed.load(Ordering::Relaxed)
    }

    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    fn set_current(&self, task_id: Option<TaskId>) {
        *self
            .current_task
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = task_id;
    }
}

#[must_use = "dropping the guard clears the current task immediately"]
pub struct CurrentTaskGuard {
    state: Arc<WorkerState>,
}

impl Drop for CurrentTaskGuard {
    fn drop(&mut self) {
        self.state.set_current(None);
    }
}
