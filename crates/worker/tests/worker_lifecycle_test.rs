mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use common::{task, FakeSchedulerClient};
use taskqueue_core::models::WorkerStatus;
use taskqueue_core::WorkerConfig;
use taskqueue_worker::{
    HandlerError, HandlerFn, HandlerRegistry, HeartbeatManager, SchedulerClient, WorkerService,
    WorkerState,
};
use tokio::sync::broadcast;

fn worker(client: &Arc<FakeSchedulerClient>, registry: HandlerRegistry) -> WorkerService {
    WorkerService::builder("worker-0", Arc::<FakeSchedulerClient>::clone(client))
        .registry(Arc::new(registry))
        .config(WorkerConfig::default())
        .hostname("test-host")
        .pid(1234)
        .build()
}

fn slow_registry(delay: Duration) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(
        "slow",
        HandlerFn::new(move |payload: Value| async move {
            tokio::time::sleep(delay).await;
            Ok(payload)
        }),
    );
    registry
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn test_worker_processes_queue_and_unregisters() {
    let tasks: Vec<_> = (0..5).map(|i| task("echo", json!({ "n": i }))).collect();
    let expected: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let client = Arc::new(FakeSchedulerClient::with_tasks(tasks));
    let service = worker(&client, HandlerRegistry::new());

    service.start().await.unwrap();
    assert!(service.is_running());

    wait_until(|| client.completed_ids().len() == 5).await;
    assert_eq!(client.completed_ids(), expected);

    service.stop().await.unwrap();
    assert!(!service.is_running());

    let registrations = client.registrations.lock().unwrap();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].worker_id, "worker-0");
    assert_eq!(registrations[0].pid, 1234);
    assert_eq!(registrations[0].hostname, "test-host");
    assert_eq!(*client.unregistered.lock().unwrap(), vec!["worker-0".to_string()]);
    assert_eq!(service.state().tasks_processed(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_registration_failure_does_not_block_startup() {
    let client = Arc::new(FakeSchedulerClient::with_tasks([task("echo", Value::Null)]));
    client.reject_registration.store(true, Ordering::SeqCst);
    let service = worker(&client, HandlerRegistry::new());

    service.start().await.unwrap();
    wait_until(|| client.completed_ids().len() == 1).await;
    service.stop().await.unwrap();

    assert!(client.registrations.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_errors_back_off_and_recover() {
    let client = Arc::new(FakeSchedulerClient::with_tasks([task("echo", Value::Null)]));
    client.fetch_errors_remaining.store(2, Ordering::SeqCst);
    let service = worker(&client, HandlerRegistry::new());

    let started = tokio::time::Instant::now();
    service.start().await.unwrap();
    wait_until(|| client.completed_ids().len() == 1).await;

    // 两次失败各退避 1 秒
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(client.fetch_calls.load(Ordering::SeqCst) >= 3);
    service.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_worker_polls_at_interval() {
    let client = Arc::new(FakeSchedulerClient::new());
    let service = worker(&client, HandlerRegistry::new());

    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    let calls = client.fetch_calls.load(Ordering::SeqCst);
    assert!((10..=12).contains(&calls), "unexpected poll count {calls}");

    client.push(task("echo", Value::Null));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(client.completed_ids().len(), 1);
    service.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_report_status() {
    let client = Arc::new(FakeSchedulerClient::new());
    let service = worker(&client, HandlerRegistry::new());

    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(11_000)).await;

    {
        let heartbeats = client.heartbeats.lock().unwrap();
        assert_eq!(heartbeats.len(), 2);
        assert!(heartbeats.iter().all(|hb| hb.worker_id == "worker-0"));
        assert!(heartbeats.iter().all(|hb| hb.status == WorkerStatus::Idle));
        assert!(heartbeats.iter().all(|hb| hb.current_task_id.is_none()));
    }

    service.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.heartbeats.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_reports_busy_task() {
    let long_task = task("slow", Value::Null);
    let task_id = long_task.id.clone();
    let client = Arc::new(FakeSchedulerClient::with_tasks([long_task]));
    let service = worker(&client, slow_registry(Duration::from_secs(7)));

    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    {
        let heartbeats = client.heartbeats.lock().unwrap();
        assert_eq!(heartbeats.len(), 1);
        assert_eq!(heartbeats[0].status, WorkerStatus::Busy);
        assert_eq!(heartbeats[0].current_task_id.as_deref(), Some(task_id.as_str()));
    }

    service.stop().await.unwrap();
    assert_eq!(client.completed_ids(), vec![task_id]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_lets_in_flight_task_finish() {
    let first = task("slow", json!(1));
    let second = task("slow", json!(2));
    let first_id = first.id.clone();
    let client = Arc::new(FakeSchedulerClient::with_tasks([first, second]));
    let service = worker(&client, slow_registry(Duration::from_millis(500)));

    service.start().await.unwrap();
    let state = service.state();
    wait_until(|| state.current_task().is_some()).await;

    service.stop().await.unwrap();

    assert_eq!(client.completed_ids(), vec![first_id]);
    assert_eq!(client.remaining(), 1);
    assert!(state.current_task().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_handler_keeps_worker_alive() {
    let client = Arc::new(FakeSchedulerClient::with_tasks([
        task("explode", Value::Null),
        task("echo", Value::Null),
    ]));
    let mut registry = HandlerRegistry::new();
    registry.register(
        "explode",
        HandlerFn::new(|_: Value| async { Err(HandlerError::Timeout(30_000)) }),
    );
    let service = worker(&client, registry);

    service.start().await.unwrap();
    wait_until(|| client.completed_ids().len() == 1).await;
    service.stop().await.unwrap();

    let failed = client.failed.lock().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].1, "处理超时 (30000ms)");
}

#[tokio::test]
async fn test_double_start_is_rejected() {
    let client = Arc::new(FakeSchedulerClient::new());
    let service = worker(&client, HandlerRegistry::new());

    service.start().await.unwrap();
    assert!(service.start().await.is_err());
    service.stop().await.unwrap();

    // 停止后可以再次启动
    service.start().await.unwrap();
    service.stop().await.unwrap();
    assert_eq!(client.unregistered.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stop_without_start_is_noop() {
    let client = Arc::new(FakeSchedulerClient::new());
    let service = worker(&client, HandlerRegistry::new());
    service.stop().await.unwrap();
    assert!(client.unregistered.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stopped_heartbeat_sends_nothing_more() {
    let client = Arc::new(FakeSchedulerClient::new());
    let heartbeat = HeartbeatManager::new(
        "worker-0".to_string(),
        Arc::clone(&client) as Arc<dyn SchedulerClient>,
        WorkerState::new(),
        Duration::from_secs(5),
    );
    // 保持发送端存活，心跳任务只能通过句柄停止
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = heartbeat.start_heartbeat_task(shutdown_rx);
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(client.heartbeats.lock().unwrap().len(), 1);

    handle.stop();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(client.heartbeats.lock().unwrap().len(), 1);
}
