use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use taskqueue_core::models::WorkerHeartbeat;
use taskqueue_core::SchedulerResult;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{SchedulerClient, WorkerState};

#[derive(Clone)]
pub struct HeartbeatManager {
    worker_id: String,
    client: Arc<dyn SchedulerClient>,
    state: Arc<WorkerState>,
    heartbeat_interval: Duration,
}

/// 心跳任务句柄，丢弃时终止心跳
pub struct HeartbeatHandle {
    handle: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// 立即终止心跳任务
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl HeartbeatManager {
    pub fn new(
        worker_id: String,
        client: Arc<dyn SchedulerClient>,
        state: Arc<WorkerState>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            worker_id,
            client,
            state,
            heartbeat_interval,
        }
    }

    /// 启动周期心跳，发送失败只记录日志
    pub fn start_heartbeat_task(&self, mut shutdown_rx: broadcast::Receiver<()>) -> HeartbeatHandle {
        let manager = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(manager.heartbeat_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次 tick 立即完成，注册时已经上报过状态
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = manager.send_heartbeat().await {
                            warn!(worker_id = %manager.worker_id, "Failed to send heartbeat: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!(worker_id = %manager.worker_id, "Heartbeat task shutting down");
                        break;
                    }
                }
            }
        });

        HeartbeatHandle { handle }
    }

    pub async fn send_heartbeat(&self) -> SchedulerResult<()> {
        let heartbeat = WorkerHeartbeat {
            worker_id: self.worker_id.clone(),
            status: self.state.status(),
            current_task_id: self.state.current_task(),
            timestamp: Utc::now(),
        };
        debug!(
            worker_id = %heartbeat.worker_id,
            status = ?heartbeat.status,
            "Sending heartbeat"
        );
        self.client.heartbeat(heartbeat).await
    }
}
