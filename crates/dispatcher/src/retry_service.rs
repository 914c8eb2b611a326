use std::time::Duration;

use taskqueue_core::SchedulerConfig;

/// 重试策略配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 基础重试间隔
    pub base_delay: Duration,
    /// 可选的单次重试间隔上限，`None` 时严格按指数增长
    pub max_delay: Option<Duration>,
    /// 提交时未指定上限时的默认最大重试次数
    pub default_max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for RetryConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            base_delay: config.base_retry_delay(),
            max_delay: config.max_retry_delay(),
            default_max_retries: config.default_max_retries,
        }
    }
}

/// 失败任务的处理决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 延迟 `delay` 后重新入队，这是第 `attempt` 次重试
    Retry { delay: Duration, attempt: u32 },
    /// 重试次数已耗尽，任务进入终态
    Exhausted,
}

impl RetryConfig {
    /// 第 k 次失败（从0开始计数）后的重试间隔：`base_delay * 2^k`
    ///
    /// 配置了 `max_delay` 时不超过该值；溢出时饱和到 `Duration::MAX`。
    pub fn delay_for(&self, retries: u32) -> Duration {
        let delay = 2u32
            .checked_pow(retries)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }

    /// 根据已重试次数和上限决定是否重试
    pub fn decide(&self, retries: u32, max_retries: u32) -> RetryDecision {
        if retries < max_retries {
            RetryDecision::Retry {
                delay: self.delay_for(retries),
                attempt: retries + 1,
            }
        } else {
            RetryDecision::Exhausted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_ms: u64) -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(base_ms),
            max_delay: None,
            default_max_retries: 3,
        }
    }

    #[test]
    fn test_exponential_delay() {
        let retry = config(1000);
        assert_eq!(retry.delay_for(0), Duration::from_millis(1000));
        assert_eq!(retry.delay_for(1), Duration::from_millis(2000));
        assert_eq!(retry.delay_for(2), Duration::from_millis(4000));
        assert_eq!(retry.delay_for(5), Duration::from_millis(32000));
    }

    #[test]
    fn test_default_delay_is_uncapped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_delay, None);
        assert_eq!(retry.delay_for(12), Duration::from_secs(4096));
        assert_eq!(retry.delay_for(20), Duration::from_secs(1 << 20));
    }

    #[test]
    fn test_delay_overflow_saturates() {
        let retry = config(1000);
        assert_eq!(retry.delay_for(32), Duration::MAX);
        assert_eq!(retry.delay_for(64), Duration::MAX);
    }

    #[test]
    fn test_configured_cap_limits_delay() {
        let retry = RetryConfig {
            max_delay: Some(Duration::from_secs(3600)),
            ..config(1000)
        };
        assert_eq!(retry.delay_for(11), Duration::from_secs(2048));
        assert_eq!(retry.delay_for(12), Duration::from_secs(3600));
        assert_eq!(retry.delay_for(64), Duration::from_secs(3600));
    }

    #[test]
    fn test_decide_exhausts_at_max_retries() {
        let retry = config(100);
        assert_eq!(
            retry.decide(0, 2),
            RetryDecision::Retry {
                delay: Duration::from_millis(100),
                attempt: 1
            }
        );
        assert_eq!(
            retry.decide(1, 2),
            RetryDecision::Retry {
                delay: Duration::from_millis(200),
                attempt: 2
            }
        );
        assert_eq!(retry.decide(2, 2), RetryDecision::Exhausted);
        assert_eq!(retry.decide(0, 0), RetryDecision::Exhausted);
    }

    #[test]
    fn test_from_scheduler_config() {
        let retry = RetryConfig::default();
        assert_eq!(retry.base_delay, Duration::from_millis(1000));
        assert_eq!(retry.default_max_retries, 3);
    }
}
