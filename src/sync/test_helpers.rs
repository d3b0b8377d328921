use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::model::task::{Task, TaskId, TaskPatch, TaskStatus};
use crate::sync::service::{ServiceError, TaskService, TaskSource};

/// In-memory task service that records every call.
#[derive(Default)]
pub struct FakeService {
    tasks: Mutex<IndexMap<TaskId, Task>>,
    /// Remaining failures per id (`u32::MAX` = always)
    failures: Mutex<HashMap<TaskId, u32>>,
    calls: Mutex<Vec<(TaskId, TaskStatus)>>,
    /// Remaining `list_all` failures
    list_failures: Mutex<u32>,
    /// Yield to the runtime before answering, to expose interleavings
    pub yield_first: bool,
}

impl FakeService {
    pub fn with_tasks(tasks: &[Task]) -> Self {
        FakeService {
            tasks: Mutex::new(tasks.iter().map(|t| (t.id.clone(), t.clone())).collect()),
            ..Default::default()
        }
    }

    pub fn yielding(mut self) -> Self {
        self.yield_first = true;
        self
    }

    pub fn fail_always(&self, id: impl Into<TaskId>) {
        self.failures.lock().unwrap().insert(id.into(), u32::MAX);
    }

    pub fn fail_times(&self, id: impl Into<TaskId>, times: u32) {
        self.failures.lock().unwrap().insert(id.into(), times);
    }

    pub fn fail_list_times(&self, times: u32) {
        *self.list_failures.lock().unwrap() = times;
    }

    pub fn calls(&self) -> Vec<(String, TaskStatus)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(id, s)| (id.to_string(), *s))
            .collect()
    }

    pub fn status_of(&self, id: impl Into<TaskId>) -> Option<TaskStatus> {
        self.tasks.lock().unwrap().get(&id.into()).map(|t| t.status)
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }

    pub fn put(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id.clone(), task);
    }
}

#[async_trait]
impl TaskService for FakeService {
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, ServiceError> {
        if self.yield_first {
            tokio::task::yield_now().await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((id.clone(), patch.target_status()));

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(id)
                && *left > 0
            {
                if *left != u32::MAX {
                    *left -= 1;
                }
                return Err(ServiceError::Network(format!("update {} failed", id)));
            }
        }

        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        patch.apply(task);
        Ok(task.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), ServiceError> {
        self.tasks
            .lock()
            .unwrap()
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }
}

#[async_trait]
impl TaskSource for FakeService {
    async fn list_all(&self) -> Result<Vec<Task>, ServiceError> {
        {
            let mut left = self.list_failures.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(ServiceError::Network("list failed".into()));
            }
        }
        Ok(self.snapshot())
    }
}
