use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    dispatcher_worker::{SchedulerConfig, SupervisorConfig, WorkerConfig},
    logging::LoggingConfig,
};

/// 未指定配置文件时依次尝试的路径
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/taskqueue.toml", "taskqueue.toml"];

/// 应用配置，启动时读取一次，运行期间不再变更
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub worker: WorkerConfig,
    pub supervisor: SupervisorConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 加载配置：内置默认值 → TOML 文件 → `TASKQUEUE_` 前缀的环境变量
    ///
    /// 环境变量使用 `__` 分隔配置段，例如 `TASKQUEUE_SUPERVISOR__WORKER_COUNT=4`。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default(
                "scheduler.default_max_retries",
                defaults.scheduler.default_max_retries as i64,
            )?
            .set_default(
                "scheduler.base_retry_delay_ms",
                defaults.scheduler.base_retry_delay_ms as i64,
            )?
            .set_default(
                "scheduler.event_buffer_size",
                defaults.scheduler.event_buffer_size as i64,
            )?
            .set_default("worker.poll_interval_ms", defaults.worker.poll_interval_ms as i64)?
            .set_default("worker.error_backoff_ms", defaults.worker.error_backoff_ms as i64)?
            .set_default(
                "worker.heartbeat_interval_seconds",
                defaults.worker.heartbeat_interval_seconds as i64,
            )?
            .set_default("supervisor.worker_count", defaults.supervisor.worker_count as i64)?
            .set_default(
                "supervisor.respawn_delay_ms",
                defaults.supervisor.respawn_delay_ms as i64,
            )?
            .set_default(
                "supervisor.stats_interval_seconds",
                defaults.supervisor.stats_interval_seconds as i64,
            )?
            .set_default(
                "supervisor.shutdown_timeout_seconds",
                defaults.supervisor.shutdown_timeout_seconds as i64,
            )?
            .set_default("logging.level", defaults.logging.level.clone())?
            .set_default("logging.format", defaults.logging.format.clone())?;

        match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(anyhow::anyhow!("配置文件不存在: {}", path));
                }
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
            None => {
                if let Some(path) = DEFAULT_CONFIG_PATHS
                    .iter()
                    .find(|path| Path::new(path).exists())
                {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TASKQUEUE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate().context("scheduler 配置无效")?;
        self.worker.validate().context("worker 配置无效")?;
        self.supervisor.validate().context("supervisor 配置无效")?;
        self.logging.validate().context("logging 配置无效")?;
        Ok(())
    }
}
