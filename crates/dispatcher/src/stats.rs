use taskqueue_core::models::{QueueLengths, SchedulerStats};

/// 增量维护的调度统计计数器
///
/// 每次状态迁移时更新，不会重新扫描任务集合。等待重试延迟的任务计入
/// `pending`，同时计入 `awaiting_retry`。
#[derive(Debug, Clone, Default)]
pub struct StatsCounters {
    created: u64,
    pending: u64,
    completed: u64,
    failed: u64,
    retried: u64,
    awaiting_retry: u64,
    avg_processing_time_ms: f64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&mut self) {
        self.created += 1;
        self.pending += 1;
    }

    pub fn record_dispatched(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// 记录一次完成，并按 `avg' = avg + (d - avg) / n` 更新平均处理耗时
    pub fn record_completed(&mut self, duration_ms: f64) {
        self.completed += 1;
        self.avg_processing_time_ms +=
            (duration_ms - self.avg_processing_time_ms) / self.completed as f64;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// 失败后安排了延迟重试：任务重新计为待处理
    pub fn record_retry_scheduled(&mut self) {
        self.pending += 1;
        self.awaiting_retry += 1;
    }

    /// 延迟结束，任务重新进入通道
    pub fn record_requeued(&mut self) {
        self.awaiting_retry = self.awaiting_retry.saturating_sub(1);
        self.retried += 1;
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn avg_processing_time_ms(&self) -> f64 {
        self.avg_processing_time_ms
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 合并时点数据生成统计快照
    pub fn snapshot(
        &self,
        queue_lengths: QueueLengths,
        processing: usize,
        active_workers: usize,
    ) -> SchedulerStats {
        SchedulerStats {
            tasks_created: self.created,
            pending_tasks: self.pending,
            processing_tasks: processing as u64,
            completed_tasks: self.completed,
            failed_tasks: self.failed,
            retried_tasks: self.retried,
            retrying_tasks: self.awaiting_retry,
            avg_processing_time_ms: self.avg_processing_time_ms,
            queue_lengths,
            active_workers,
        }
    }
}
