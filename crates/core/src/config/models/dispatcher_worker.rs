use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 调度器（队列管理器）配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 提交时未指定 maxRetries 时使用的重试上限
    pub default_max_retries: u32,
    /// 基础重试间隔（毫秒），第 k 次失败等待 base * 2^k
    pub base_retry_delay_ms: u64,
    /// 单次重试间隔上限（毫秒），缺省不设上限
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry_delay_ms: Option<u64>,
    /// 事件广播缓冲区容量，溢出时丢弃最旧的事件
    pub event_buffer_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            base_retry_delay_ms: 1000,
            max_retry_delay_ms: None,
            event_buffer_size: 1024,
        }
    }
}

impl SchedulerConfig {
    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Option<Duration> {
        self.max_retry_delay_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_retry_delay_ms == 0 {
            return Err(anyhow::anyhow!("基础重试间隔必须大于0"));
        }

        if let Some(max_ms) = self.max_retry_delay_ms {
            if max_ms < self.base_retry_delay_ms {
                return Err(anyhow::anyhow!(
                    "最大重试间隔({}ms)不能小于基础重试间隔({}ms)",
                    max_ms,
                    self.base_retry_delay_ms
                ));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(anyhow::anyhow!("事件缓冲区容量必须大于0"));
        }

        Ok(())
    }
}

/// Worker 轮询循环配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// 队列为空时的轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 获取任务失败后的退避时间（毫秒）
    pub error_backoff_ms: u64,
    pub heartbeat_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            error_backoff_ms: 1000,
            heartbeat_interval_seconds: 5,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("任务轮询间隔必须大于0"));
        }

        if self.error_backoff_ms == 0 {
            return Err(anyhow::anyhow!("错误退避时间必须大于0"));
        }

        if self.heartbeat_interval_seconds == 0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }

        Ok(())
    }
}

/// Worker 进程池监督配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Worker 数量，默认等于可用 CPU 并行度
    pub worker_count: usize,
    /// Worker 退出后重新拉起前的等待时间（毫秒）
    pub respawn_delay_ms: u64,
    /// 统计日志输出间隔（秒）
    pub stats_interval_seconds: u64,
    /// 优雅关闭的最长等待时间（秒）
    pub shutdown_timeout_seconds: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            respawn_delay_ms: 1000,
            stats_interval_seconds: 30,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl SupervisorConfig {
    pub fn respawn_delay(&self) -> Duration {
        Duration::from_millis(self.respawn_delay_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_count == 0 {
            return Err(anyhow::anyhow!("Worker数量必须大于0"));
        }

        if self.stats_interval_seconds == 0 {
            return Err(anyhow::anyhow!("统计间隔必须大于0"));
        }

        if self.shutdown_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("关闭超时时间必须大于0"));
        }

        Ok(())
    }
}

/// 可用 CPU 并行度，无法获取时为 1
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(WorkerConfig::default().validate().is_ok());
        assert!(SupervisorConfig::default().validate().is_ok());
        assert!(default_worker_count() >= 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let scheduler = SchedulerConfig {
            max_retry_delay_ms: Some(10),
            ..SchedulerConfig::default()
        };
        assert!(scheduler.validate().is_err());

        let worker = WorkerConfig {
            poll_interval_ms: 0,
            ..WorkerConfig::default()
        };
        assert!(worker.validate().is_err());

        let supervisor = SupervisorConfig {
            worker_count: 0,
            ..SupervisorConfig::default()
        };
        assert!(supervisor.validate().is_err());
    }
}
