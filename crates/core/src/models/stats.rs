use serde::{Deserialize, Serialize};

/// 各优先级通道的当前长度
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueLengths {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl QueueLengths {
    pub fn total(&self) -> usize {
        self.high + self.normal + self.low
    }
}

/// 调度器统计快照
///
/// `pending_tasks` 包含正在等待重试延迟的任务，其数量另见 `retrying_tasks`，
/// 因此任何时刻都满足
/// `pending + processing + completed + failed == tasks_created`。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerStats {
    pub tasks_created: u64,
    pub pending_tasks: u64,
    pub processing_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub retried_tasks: u64,
    pub retrying_tasks: u64,
    /// 平均处理耗时（毫秒）
    pub avg_processing_time_ms: f64,
    pub queue_lengths: QueueLengths,
    pub active_workers: usize,
}

impl SchedulerStats {
    /// 已进入终态的任务数
    pub fn finished_tasks(&self) -> u64 {
        self.completed_tasks + self.failed_tasks
    }

    /// 校验计数守恒关系
    pub fn is_balanced(&self) -> bool {
        self.pending_tasks + self.processing_tasks + self.completed_tasks + self.failed_tasks
            == self.tasks_created
    }
}
