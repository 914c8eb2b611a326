#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use taskqueue_core::models::{NewTask, Task, WorkerHeartbeat, WorkerRegistration};
use taskqueue_core::{SchedulerError, SchedulerResult};
use taskqueue_worker::SchedulerClient;

/// 记录所有调用的调度器替身
#[derive(Default)]
pub struct FakeSchedulerClient {
    pub tasks: Mutex<VecDeque<Task>>,
    pub completed: Mutex<Vec<(String, Value)>>,
    pub failed: Mutex<Vec<(String, String)>>,
    pub heartbeats: Mutex<Vec<WorkerHeartbeat>>,
    pub registrations: Mutex<Vec<WorkerRegistration>>,
    pub unregistered: Mutex<Vec<String>>,
    pub fetch_calls: AtomicUsize,
    pub fetch_errors_remaining: AtomicUsize,
    pub reject_registration: AtomicBool,
    pub reject_reports: AtomicBool,
}

impl FakeSchedulerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let client = Self::new();
        client.tasks.lock().unwrap().extend(tasks);
        client
    }

    pub fn push(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(task);
    }

    pub fn completed_ids(&self) -> Vec<String> {
        self.completed
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait]
impl SchedulerClient for FakeSchedulerClient {
    async fn register(&self, registration: WorkerRegistration) -> SchedulerResult<()> {
        if self.reject_registration.load(Ordering::SeqCst) {
            return Err(SchedulerError::Transport("scheduler unreachable".into()));
        }
        self.registrations.lock().unwrap().push(registration);
        Ok(())
    }

    async fn heartbeat(&self, heartbeat: WorkerHeartbeat) -> SchedulerResult<()> {
        self.heartbeats.lock().unwrap().push(heartbeat);
        Ok(())
    }

    async fn unregister(&self, worker_id: &str) -> SchedulerResult<()> {
        self.unregistered.lock().unwrap().push(worker_id.to_string());
        Ok(())
    }

    async fn fetch_next(&self, _worker_id: &str) -> SchedulerResult<Option<Task>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fetch_errors_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SchedulerError::Transport("connection reset".into()));
        }
        Ok(self.tasks.lock().unwrap().pop_front())
    }

    async fn complete(&self, task_id: &str, result: Value) -> SchedulerResult<()> {
        if self.reject_reports.load(Ordering::SeqCst) {
            return Err(SchedulerError::Transport("report dropped".into()));
        }
        self.completed
            .lock()
            .unwrap()
            .push((task_id.to_string(), result));
        Ok(())
    }

    async fn fail(&self, task_id: &str, error: &str) -> SchedulerResult<()> {
        if self.reject_reports.load(Ordering::SeqCst) {
            return Err(SchedulerError::Transport("report dropped".into()));
        }
        self.failed
            .lock()
            .unwrap()
            .push((task_id.to_string(), error.to_string()));
        Ok(())
    }
}

pub fn task(task_type: &str, payload: Value) -> Task {
    Task::new(NewTask::new(task_type, payload), 3)
}
