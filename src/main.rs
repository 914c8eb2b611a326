use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use taskqueue_core::AppConfig;
use taskqueue_worker::ShutdownOutcome;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::{builtin_handlers, Application};
use shutdown::{wait_for_shutdown_signal, ShutdownManager};

/// 运行时关闭时等待残留任务的时间，超过后不再等待仍阻塞在处理器中的线程
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("创建Tokio运行时失败")?;

    let result = runtime.block_on(run());
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

async fn run() -> Result<ExitCode> {
    // 解析命令行参数
    let matches = Command::new("taskqueue")
        .version(env!("CARGO_PKG_VERSION"))
        .about("优先级任务队列与 Worker 进程池")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时尝试 config/taskqueue.toml"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("N")
                .help("Worker 数量，覆盖配置文件")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("submit")
                .short('s')
                .long("submit")
                .value_name("FILE")
                .help("启动时提交的任务文件（JSON 数组）")
                .value_parser(value_parser!(PathBuf)),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");

    // 加载配置，命令行参数覆盖配置文件
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| match config_path {
            Some(path) => format!("加载配置文件失败: {path}"),
            None => "加载配置失败".to_string(),
        })?;
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.supervisor.worker_count = *workers;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.clone();
    }
    config.validate().context("命令行参数无效")?;

    init_logging(&config.logging.level, &config.logging.format)?;

    info!(
        workers = config.supervisor.worker_count,
        pid = std::process::id(),
        "启动任务队列"
    );

    let app = Arc::new(Application::new(config, builtin_handlers()));

    if let Some(path) = matches.get_one::<PathBuf>("submit") {
        let batch = app.submit_from_file(path).await?;
        info!(accepted = batch.accepted, "初始任务已入队");
    }

    // 创建优雅关闭管理器
    let shutdown_manager = ShutdownManager::new();
    let event_logger = app.spawn_event_logger(shutdown_manager.subscribe());

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown_manager.subscribe();
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    let exit_code = match app_handle.await {
        Ok(Ok(ShutdownOutcome::Clean)) => {
            info!("应用已优雅关闭");
            ExitCode::SUCCESS
        }
        Ok(Ok(ShutdownOutcome::TimedOut { aborted })) => {
            warn!(aborted, "关闭超时，部分 Worker 被强制终止");
            ExitCode::FAILURE
        }
        Ok(Err(e)) => {
            error!("应用运行失败: {e:#}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("应用任务异常退出: {e}");
            ExitCode::FAILURE
        }
    };

    if let Err(e) = event_logger.await {
        warn!("事件日志任务异常退出: {e}");
    }

    info!("任务队列已退出");
    Ok(exit_code)
}

/// 初始化日志系统，`RUST_LOG` 优先于配置的级别
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}
