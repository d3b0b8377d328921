use async_trait::async_trait;

use crate::model::task::{Task, TaskId, TaskPatch};
use crate::model::tree::TaskNode;

/// Error returned by a remote task service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Mutation side of the task service. One response per request; nothing
/// is batched server-side.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, ServiceError>;
    async fn delete(&self, id: &TaskId) -> Result<(), ServiceError>;
}

/// Fetch side of the task service
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Task>, ServiceError>;
}

/// Asks the user before a destructive cascade.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// `task` is about to move from DONE back to TODO, resetting `affected` with it
    async fn confirm_cascade(&self, task: &TaskNode, affected: &[&TaskNode]) -> bool;
}

/// Confirmer with a fixed answer (scripts, `--yes`, tests)
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm_cascade(&self, _task: &TaskNode, _affected: &[&TaskNode]) -> bool {
        self.0
    }
}
