use std::env;
use std::fs;

use serde_json::json;
use taskqueue_core::config::*;
use taskqueue_core::models::{NewTask, Task, TaskPriority, TaskStatus};
use tempfile::TempDir;

#[test]
fn test_env_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("taskqueue.toml");
    fs::write(
        &path,
        r#"
[supervisor]
worker_count = 2
respawn_delay_ms = 500

[logging]
format = "json"
"#,
    )
    .unwrap();

    env::set_var("TASKQUEUE_SUPERVISOR__WORKER_COUNT", "6");
    let loaded = AppConfig::load(path.to_str());
    env::remove_var("TASKQUEUE_SUPERVISOR__WORKER_COUNT");

    let config = loaded.unwrap();
    assert_eq!(config.supervisor.worker_count, 6);
    assert_eq!(config.supervisor.respawn_delay_ms, 500);
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.worker, WorkerConfig::default());
}

#[test]
fn test_invalid_file_values_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("taskqueue.toml");
    fs::write(&path, "[scheduler]\nbase_retry_delay_ms = 0\n").unwrap();

    let err = AppConfig::load(path.to_str()).unwrap_err();
    assert!(format!("{err:#}").contains("scheduler"));
}

#[test]
fn test_durations_follow_config() {
    let config = AppConfig::from_toml(
        r#"
[worker]
poll_interval_ms = 20
heartbeat_interval_seconds = 2

[supervisor]
worker_count = 1
shutdown_timeout_seconds = 3
"#,
    )
    .unwrap();

    assert_eq!(config.worker.poll_interval().as_millis(), 20);
    assert_eq!(config.worker.heartbeat_interval().as_secs(), 2);
    assert_eq!(config.supervisor.shutdown_timeout().as_secs(), 3);
}

#[test]
fn test_retry_delay_cap_is_opt_in() {
    let defaults = AppConfig::default();
    assert_eq!(defaults.scheduler.max_retry_delay(), None);
    assert!(!defaults.to_toml().unwrap().contains("max_retry_delay_ms"));

    let capped = AppConfig::from_toml("[scheduler]\nmax_retry_delay_ms = 60000\n").unwrap();
    assert_eq!(capped.scheduler.max_retry_delay_ms, Some(60_000));
    assert_eq!(capped.scheduler.max_retry_delay().unwrap().as_secs(), 60);
}

#[test]
fn test_new_task_defaults() {
    let task = Task::new(NewTask::new("email", json!({"to": "a@b.c"})), 3);

    assert!(!task.id.is_empty());
    assert_eq!(task.priority, TaskPriority::Normal);
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.retries, 0);
    assert_eq!(task.max_retries, 3);
    assert_eq!(task.created_at, task.updated_at);
    assert!(task.worker_id.is_none());

    let other = Task::new(NewTask::new("email", json!(null)), 3);
    assert_ne!(task.id, other.id);
}
