use std::collections::VecDeque;

use taskqueue_core::models::{QueueLengths, TaskId, TaskPriority};

/// 三通道优先级队列
///
/// 每个通道内部先进先出；通道之间严格按 high、normal、low 的顺序出队。
/// 队列只保存任务ID，任务数据由调度器的任务存储持有。
#[derive(Debug, Default)]
pub struct PriorityQueueSet {
    high: VecDeque<TaskId>,
    normal: VecDeque<TaskId>,
    low: VecDeque<TaskId>,
}

impl PriorityQueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane_mut(&mut self, priority: TaskPriority) -> &mut VecDeque<TaskId> {
        match priority {
            TaskPriority::High => &mut self.high,
            TaskPriority::Normal => &mut self.normal,
            TaskPriority::Low => &mut self.low,
        }
    }

    /// 追加到对应通道的队尾
    pub fn push_back(&mut self, priority: TaskPriority, id: TaskId) {
        self.lane_mut(priority).push_back(id);
    }

    /// 取出优先级最高的非空通道中最早入队的任务
    pub fn pop_next(&mut self) -> Option<(TaskPriority, TaskId)> {
        TaskPriority::ALL.into_iter().find_map(|priority| {
            self.lane_mut(priority)
                .pop_front()
                .map(|id| (priority, id))
        })
    }

    pub fn total_len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn lengths(&self) -> QueueLengths {
        QueueLengths {
            high: self.high.len(),
            normal: self.normal.len(),
            low: self.low.len(),
        }
    }

    pub fn clear(&mut self) {
        self.high.clear();
        self.normal.clear();
        self.low.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        s.to_string()
    }

    #[test]
    fn test_strict_priority_order() {
        let mut queues = PriorityQueueSet::new();
        queues.push_back(TaskPriority::Low, id("low-1"));
        queues.push_back(TaskPriority::Normal, id("normal-1"));
        queues.push_back(TaskPriority::High, id("high-1"));
        queues.push_back(TaskPriority::High, id("high-2"));

        assert_eq!(queues.pop_next(), Some((TaskPriority::High, id("high-1"))));
        assert_eq!(queues.pop_next(), Some((TaskPriority::High, id("high-2"))));
        assert_eq!(queues.pop_next(), Some((TaskPriority::Normal, id("normal-1"))));
        assert_eq!(queues.pop_next(), Some((TaskPriority::Low, id("low-1"))));
        assert_eq!(queues.pop_next(), None);
    }

    #[test]
    fn test_fifo_within_lane() {
        let mut queues = PriorityQueueSet::new();
        for name in ["t1", "t2", "t3"] {
            queues.push_back(TaskPriority::Normal, id(name));
        }

        let order: Vec<_> = std::iter::from_fn(|| queues.pop_next().map(|(_, id)| id)).collect();
        assert_eq!(order, vec![id("t1"), id("t2"), id("t3")]);
    }

    #[test]
    fn test_lengths_and_clear() {
        let mut queues = PriorityQueueSet::new();
        queues.push_back(TaskPriority::High, id("a"));
        queues.push_back(TaskPriority::Low, id("b"));
        queues.push_back(TaskPriority::Low, id("c"));

        let lengths = queues.lengths();
        assert_eq!((lengths.high, lengths.normal, lengths.low), (1, 0, 2));
        assert_eq!(queues.total_len(), 3);

        queues.clear();
        assert_eq!(queues.total_len(), 0);
        assert_eq!(queues.pop_next(), None);
    }
}
