//! 生命周期事件广播
//!
//! [`EventBus`] 是对 [`tokio::sync::broadcast`] 的薄封装：
//!
//! - 发布不阻塞，没有订阅者时事件直接丢弃
//! - 所有订阅者共享一个固定容量的环形缓冲区
//! - 溢出策略为丢弃最旧：落后的订阅者在下一次 `recv()` 时收到
//!   `RecvError::Lagged(n)`，表示跳过了 `n` 个事件

use tokio::sync::broadcast;
use tracing::trace;

use taskqueue_core::models::SchedulerEvent;

#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    /// 创建指定容量的事件总线，容量最小为1
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 发布事件，从不阻塞
    pub fn publish(&self, event: SchedulerEvent) {
        let kind = event.kind;
        if self.tx.send(event).is_err() {
            trace!(%kind, "No event subscribers, event dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskqueue_core::models::{EventKind, NewTask, Task};
    use tokio::sync::broadcast::error::RecvError;

    fn created_event() -> SchedulerEvent {
        let task = Task::new(NewTask::new("noop", serde_json::Value::Null), 0);
        SchedulerEvent::task(EventKind::TaskCreated, &task)
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_fail() {
        let bus = EventBus::new(4);
        bus.publish(created_event());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_drops_oldest() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        let events: Vec<_> = (0..3).map(|_| created_event()).collect();
        for event in &events {
            bus.publish(event.clone());
        }

        match rx.recv().await {
            Err(RecvError::Lagged(skipped)) => assert_eq!(skipped, 1),
            other => panic!("expected lag, got {other:?}"),
        }
        assert_eq!(rx.recv().await.unwrap(), events[1]);
        assert_eq!(rx.recv().await.unwrap(), events[2]);
    }
}
