use std::sync::Arc;

use crate::model::config::{CascadeConfig, CascadeScope};
use crate::model::task::{Task, TaskId, TaskPatch, TaskStatus};
use crate::model::tree::TaskNode;
use crate::ops::complete::{blocking_children, can_complete};
use crate::sync::service::{Confirmer, ServiceError, TaskService};

/// Result of a status change request that did not fail remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Task already had the requested status; nothing sent
    Unchanged,
    /// Completion refused locally because these children are not done
    Rejected { blocking: Vec<TaskId> },
    /// The user declined a cascading reset; nothing sent
    Declined,
    /// Single update acknowledged by the server
    Applied(Task),
    /// Task and every task in the cascade scope reset to TODO
    Cascaded { parent: Task, reset: Vec<Task> },
}

/// Remote failure while applying a transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("could not update task {id}: {source}")]
    Mutation {
        id: TaskId,
        #[source]
        source: ServiceError,
    },
    /// The task itself was reset but some cascade targets were not
    #[error("task {} was reset but subtasks {} could not be reset", .parent.id, id_list(.pending))]
    PartialCascade {
        parent: Box<Task>,
        reset: Vec<Task>,
        pending: Vec<TaskId>,
    },
}

fn id_list(ids: &[TaskId]) -> String {
    ids.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackLevel {
    Info,
    Warning,
    Error,
}

/// What a view should tell the user after a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub message: String,
}

impl Feedback {
    pub fn info(message: impl Into<String>) -> Self {
        Feedback {
            level: FeedbackLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Feedback {
            level: FeedbackLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Feedback {
            level: FeedbackLevel::Error,
            message: message.into(),
        }
    }
}

impl TransitionOutcome {
    /// Did the server acknowledge at least one update?
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::Applied(_) | TransitionOutcome::Cascaded { .. }
        )
    }

    /// Tasks acknowledged by the server, parent first
    pub fn acknowledged(&self) -> Vec<&Task> {
        match self {
            TransitionOutcome::Applied(t) => vec![t],
            TransitionOutcome::Cascaded { parent, reset } => {
                std::iter::once(parent).chain(reset.iter()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn feedback(&self) -> Feedback {
        match self {
            TransitionOutcome::Unchanged => Feedback::info("no change"),
            TransitionOutcome::Rejected { blocking } => Feedback::warning(format!(
                "complete child tasks first ({} open: {})",
                blocking.len(),
                id_list(blocking)
            )),
            TransitionOutcome::Declined => Feedback::info("cancelled"),
            TransitionOutcome::Applied(t) => {
                Feedback::info(format!("{} is now {}", t.id, t.status))
            }
            TransitionOutcome::Cascaded { parent, reset } => Feedback::info(format!(
                "{} reopened with {} subtask(s)",
                parent.id,
                reset.len()
            )),
        }
    }
}

impl TransitionError {
    /// Tasks the server did acknowledge before the failure
    pub fn acknowledged(&self) -> Vec<&Task> {
        match self {
            TransitionError::Mutation { .. } => Vec::new(),
            TransitionError::PartialCascade { parent, reset, .. } => {
                std::iter::once(parent.as_ref()).chain(reset.iter()).collect()
            }
        }
    }

    pub fn feedback(&self) -> Feedback {
        match self {
            TransitionError::Mutation { .. } => Feedback::error(self.to_string()),
            TransitionError::PartialCascade { pending, .. } => Feedback::error(format!(
                "partial reset: {}; update {} manually",
                self,
                if pending.len() == 1 { "it" } else { "them" }
            )),
        }
    }
}

/// Applies one status change, enforcing the completion rule and the
/// confirmed cascade when a finished task is reopened.
pub struct TransitionOrchestrator {
    service: Arc<dyn TaskService>,
    confirmer: Arc<dyn Confirmer>,
    cascade: CascadeConfig,
}

impl TransitionOrchestrator {
    pub fn new(
        service: Arc<dyn TaskService>,
        confirmer: Arc<dyn Confirmer>,
        cascade: CascadeConfig,
    ) -> Self {
        TransitionOrchestrator {
            service,
            confirmer,
            cascade,
        }
    }

    pub async fn request_transition(
        &self,
        node: &TaskNode,
        new_status: TaskStatus,
    ) -> Result<TransitionOutcome, TransitionError> {
        let current = node.task.status;
        if current == new_status {
            return Ok(TransitionOutcome::Unchanged);
        }

        if new_status == TaskStatus::Done && !can_complete(node) {
            let blocking: Vec<TaskId> = blocking_children(node)
                .iter()
                .map(|t| t.id.clone())
                .collect();
            tracing::info!(id = %node.id(), open = blocking.len(), "completion rejected: open subtasks");
            return Ok(TransitionOutcome::Rejected { blocking });
        }

        if current == TaskStatus::Done && new_status == TaskStatus::Todo {
            let targets = self.cascade_targets(node);
            if !targets.is_empty() {
                if !self.confirmer.confirm_cascade(node, &targets).await {
                    tracing::debug!(id = %node.id(), "cascade reset declined");
                    return Ok(TransitionOutcome::Declined);
                }
                return self.cascade_reset(node, &targets).await;
            }
        }

        let task = self.send(node.id(), new_status).await?;
        tracing::info!(id = %task.id, status = %task.status, "transition applied");
        Ok(TransitionOutcome::Applied(task))
    }

    /// Tasks reset along with `node` when it is reopened
    pub fn cascade_targets<'a>(&self, node: &'a TaskNode) -> Vec<&'a TaskNode> {
        match self.cascade.scope {
            CascadeScope::Children => node.children.iter().collect(),
            CascadeScope::Descendants => node.descendants(),
        }
    }

    async fn cascade_reset(
        &self,
        node: &TaskNode,
        targets: &[&TaskNode],
    ) -> Result<TransitionOutcome, TransitionError> {
        let parent = self.send(node.id(), TaskStatus::Todo).await?;

        let mut reset = Vec::with_capacity(targets.len());
        let mut pending: Vec<&TaskId> = targets.iter().map(|t| t.id()).collect();
        let mut pass = 0;
        loop {
            let mut failed = Vec::new();
            for id in pending {
                match self.service.update(id, TaskPatch::status(TaskStatus::Todo)).await {
                    Ok(task) => reset.push(task),
                    Err(e) => {
                        tracing::warn!(parent = %node.id(), child = %id, pass, error = %e, "cascade reset failed");
                        failed.push(id);
                    }
                }
            }
            pending = failed;
            if pending.is_empty() || pass >= self.cascade.retries {
                break;
            }
            pass += 1;
        }

        if pending.is_empty() {
            tracing::info!(id = %parent.id, reset = reset.len(), "cascade reset applied");
            Ok(TransitionOutcome::Cascaded { parent, reset })
        } else {
            Err(TransitionError::PartialCascade {
                parent: Box::new(parent),
                reset,
                pending: pending.into_iter().cloned().collect(),
            })
        }
    }

    async fn send(&self, id: &TaskId, status: TaskStatus) -> Result<Task, TransitionError> {
        self.service
            .update(id, TaskPatch::status(status))
            .await
            .map_err(|source| {
                tracing::warn!(id = %id, error = %source, "task update failed");
                TransitionError::Mutation {
                    id: id.clone(),
                    source,
                }
            })
    }
}
