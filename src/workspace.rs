use std::sync::Arc;

use crate::model::config::EngineConfig;
use crate::model::task::{TaskId, TaskStatus};
use crate::model::tree::{TaskNode, find_node};
use crate::model::view_state::{ExpandState, Selection};
use crate::ops::bulk::{BulkOrchestrator, BulkOutcome};
use crate::ops::complete::can_complete;
use crate::ops::filter::{Filters, Row};
use crate::ops::transition::{TransitionError, TransitionOrchestrator, TransitionOutcome};
use crate::sync::listener::{RealtimeEvent, UpdateListener};
use crate::sync::reconcile::{Column, ReconcileOutcome, Reconciler};
use crate::sync::service::{Confirmer, ServiceError, TaskService, TaskSource};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("task not found: {0}")]
    UnknownTask(TaskId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// A status change whose placement is staged but whose request has not
/// been sent. The workspace stays readable while [`send`](Self::send) runs.
pub struct PendingTransition {
    node: TaskNode,
    status: TaskStatus,
    bulk: Arc<BulkOrchestrator>,
}

impl PendingTransition {
    pub fn id(&self) -> &TaskId {
        self.node.id()
    }

    pub async fn send(self) -> SentTransition {
        let result = self
            .bulk
            .transitions()
            .request_transition(&self.node, self.status)
            .await;
        SentTransition {
            id: self.node.id().clone(),
            result,
        }
    }
}

/// Answer to a [`PendingTransition`], waiting to be folded back in
pub struct SentTransition {
    id: TaskId,
    result: Result<TransitionOutcome, TransitionError>,
}

/// A bulk change with every selected task staged. Holds the selection
/// until the batch is folded back in.
pub struct PendingBulk {
    nodes: Vec<TaskNode>,
    status: TaskStatus,
    selection: Selection,
    bulk: Arc<BulkOrchestrator>,
}

impl PendingBulk {
    pub async fn send(mut self) -> SentBulk {
        let refs: Vec<&TaskNode> = self.nodes.iter().collect();
        let outcome = self
            .bulk
            .request_bulk_transition(&refs, self.status, &mut self.selection)
            .await;
        SentBulk {
            ids: self.nodes.iter().map(|n| n.id().clone()).collect(),
            selection: self.selection,
            outcome,
        }
    }
}

pub struct SentBulk {
    ids: Vec<TaskId>,
    selection: Selection,
    outcome: BulkOutcome,
}

/// Everything one view needs: the reconciled collection plus its own
/// filter, expand and selection state, wired to the orchestrators.
pub struct Workspace {
    reconciler: Reconciler,
    pub filters: Filters,
    pub expanded: ExpandState,
    pub selection: Selection,
    bulk: Arc<BulkOrchestrator>,
    source: Arc<dyn TaskSource>,
    config: EngineConfig,
}

impl Workspace {
    pub fn new(
        service: Arc<dyn TaskService>,
        source: Arc<dyn TaskSource>,
        confirmer: Arc<dyn Confirmer>,
        config: EngineConfig,
    ) -> Self {
        let transitions = TransitionOrchestrator::new(service, confirmer, config.cascade.clone());
        Workspace {
            reconciler: Reconciler::new(config.tree.max_depth),
            filters: Filters::default(),
            expanded: ExpandState::default(),
            selection: Selection::default(),
            bulk: Arc::new(BulkOrchestrator::new(transitions)),
            source,
            config,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn forest(&self) -> &[TaskNode] {
        self.reconciler.forest()
    }

    /// Fetch a fresh authoritative snapshot
    pub async fn refresh(&mut self) -> Result<ReconcileOutcome, ServiceError> {
        let tasks = self.source.list_all().await?;
        let outcome = self.reconciler.apply_snapshot(tasks);
        if outcome == ReconcileOutcome::Rebuilt && self.config.view.expand_all {
            self.expanded.expand_all(self.reconciler.forest());
        }
        Ok(outcome)
    }

    pub fn visible_rows(&self) -> Vec<Row> {
        self.reconciler.visible_rows(&self.filters, &self.expanded)
    }

    pub fn board(&self) -> Vec<Column> {
        self.reconciler.board()
    }

    /// `None` if the id is unknown
    pub fn can_complete(&self, id: &TaskId) -> Option<bool> {
        find_node(self.reconciler.forest(), id).map(can_complete)
    }

    /// Stage `id` under `new_status` and hand back the request to send.
    /// Views render the staged placement until [`finish_transition`](Self::finish_transition).
    pub fn begin_transition(
        &mut self,
        id: &TaskId,
        new_status: TaskStatus,
    ) -> Result<PendingTransition, WorkspaceError> {
        let node = find_node(self.reconciler.forest(), id)
            .cloned()
            .ok_or_else(|| WorkspaceError::UnknownTask(id.clone()))?;
        self.reconciler.stage(id.clone(), new_status);
        Ok(PendingTransition {
            node,
            status: new_status,
            bulk: self.bulk.clone(),
        })
    }

    /// Write acknowledged tasks to the authoritative collection and drop
    /// the staged placement, whatever the answer was.
    pub fn finish_transition(
        &mut self,
        sent: SentTransition,
    ) -> Result<TransitionOutcome, WorkspaceError> {
        match &sent.result {
            Ok(outcome) => {
                for task in outcome.acknowledged() {
                    self.reconciler.apply_update(task.clone());
                }
            }
            Err(e) => {
                tracing::warn!(id = %sent.id, error = %e, "transition failed, reverting");
                for task in e.acknowledged() {
                    self.reconciler.apply_update(task.clone());
                }
            }
        }
        self.reconciler.rollback(&sent.id);
        Ok(sent.result?)
    }

    /// Stage, send and finish one status change
    pub async fn transition(
        &mut self,
        id: &TaskId,
        new_status: TaskStatus,
    ) -> Result<TransitionOutcome, WorkspaceError> {
        let pending = self.begin_transition(id, new_status)?;
        let sent = pending.send().await;
        self.finish_transition(sent)
    }

    /// Stage every selected task under `new_status`. The selection moves
    /// into the returned batch and comes back in [`finish_bulk`](Self::finish_bulk).
    pub fn begin_bulk(&mut self, new_status: TaskStatus) -> PendingBulk {
        let nodes: Vec<TaskNode> = self
            .selection
            .resolve(self.reconciler.forest())
            .into_iter()
            .cloned()
            .collect();
        for node in &nodes {
            self.reconciler.stage(node.id().clone(), new_status);
        }
        PendingBulk {
            nodes,
            status: new_status,
            selection: std::mem::take(&mut self.selection),
            bulk: self.bulk.clone(),
        }
    }

    pub fn finish_bulk(&mut self, sent: SentBulk) -> BulkOutcome {
        if let BulkOutcome::Finished(summary) = &sent.outcome {
            for task in &summary.acknowledged {
                self.reconciler.apply_update(task.clone());
            }
        }
        for id in &sent.ids {
            self.reconciler.rollback(id);
        }
        self.selection = sent.selection;
        sent.outcome
    }

    /// Apply `new_status` to the current selection
    pub async fn bulk_transition(&mut self, new_status: TaskStatus) -> BulkOutcome {
        let pending = self.begin_bulk(new_status);
        let sent = pending.send().await;
        self.finish_bulk(sent)
    }

    /// Apply one real-time event
    pub async fn handle_event(
        &mut self,
        listener: &mut UpdateListener,
        event: RealtimeEvent,
    ) -> Result<ReconcileOutcome, ServiceError> {
        listener.handle(event, &mut self.reconciler).await
    }

    /// Apply events that queued up while the workspace was busy
    pub async fn catch_up(&mut self, listener: &mut UpdateListener) -> Result<bool, ServiceError> {
        let (_, rebuilt) = listener.drain(&mut self.reconciler).await?;
        Ok(rebuilt)
    }
}
