use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::task::{Task, TaskId, TaskStatus};
use crate::model::tree::TaskNode;
use crate::model::view_state::ExpandState;
use crate::ops::filter::{Filters, Row, rows_for_forest};
use crate::ops::tree_ops::build_forest_bounded;

/// Digest over the fields that change what a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 32]);

impl Signature {
    pub fn of<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut hasher = Sha256::new();
        for task in tasks {
            hasher.update(task.id.as_str().as_bytes());
            hasher.update(b"\x1f");
            hasher.update(task.status.as_str().as_bytes());
            hasher.update(b"\x1f");
            if let Some(parent) = &task.parent_id {
                hasher.update(parent.as_str().as_bytes());
            }
            hasher.update(b"\x1f");
            hasher.update(task.priority.as_str().as_bytes());
            hasher.update(b"\x1f");
            hasher.update(task.title.as_bytes());
            hasher.update(b"\x1e");
        }
        Signature(hasher.finalize().into())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// What a reconciliation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Content signature unchanged; derived and optimistic state kept
    Unchanged,
    /// Derived state rebuilt and optimistic state discarded
    Rebuilt,
    /// Incoming record was older than the one held and was ignored
    Stale,
}

/// A board column: tasks that currently render under one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

/// Holds the authoritative collection, the tree derived from it, and the
/// optimistic placements views render until the server catches up.
///
/// Only this type writes the authoritative collection, and it always
/// rebuilds the derived tree before returning, so readers never see a
/// half-applied snapshot.
#[derive(Debug, Clone)]
pub struct Reconciler {
    tasks: IndexMap<TaskId, Task>,
    signature: Option<Signature>,
    forest: Vec<TaskNode>,
    placements: HashMap<TaskId, TaskStatus>,
    max_depth: usize,
}

impl Reconciler {
    pub fn new(max_depth: usize) -> Self {
        Reconciler {
            tasks: IndexMap::new(),
            signature: None,
            forest: Vec::new(),
            placements: HashMap::new(),
            max_depth,
        }
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn forest(&self) -> &[TaskNode] {
        &self.forest
    }

    pub fn signature(&self) -> Option<Signature> {
        self.signature
    }

    /// Replace the whole collection with a fetched or pushed snapshot.
    /// The new snapshot wins outright; nothing is merged field by field.
    pub fn apply_snapshot(&mut self, tasks: Vec<Task>) -> ReconcileOutcome {
        let mut incoming: IndexMap<TaskId, Task> = IndexMap::with_capacity(tasks.len());
        for task in tasks {
            incoming.entry(task.id.clone()).or_insert(task);
        }
        let signature = Signature::of(incoming.values());
        if self.signature == Some(signature) {
            tracing::debug!(%signature, "snapshot signature unchanged, keeping placements");
            if self.tasks != incoming {
                self.tasks = incoming;
                self.forest = build_forest_bounded(&self.task_vec(), self.max_depth);
            }
            return ReconcileOutcome::Unchanged;
        }
        self.tasks = incoming;
        self.rebuild(signature)
    }

    /// Insert or replace one task by id (push event or server ack).
    ///
    /// Last write wins on `updated_at`: a record strictly older than the
    /// held one is ignored. Replaying the same record is a no-op.
    pub fn apply_update(&mut self, task: Task) -> ReconcileOutcome {
        if let Some(held) = self.tasks.get(&task.id)
            && let (Some(held_at), Some(new_at)) = (held.updated_at, task.updated_at)
            && new_at < held_at
        {
            tracing::debug!(id = %task.id, "ignoring out-of-order update");
            return ReconcileOutcome::Stale;
        }
        let previous = self.tasks.insert(task.id.clone(), task.clone());
        if previous.as_ref() == Some(&task) {
            return ReconcileOutcome::Unchanged;
        }
        self.refresh()
    }

    pub fn apply_removal(&mut self, id: &TaskId) -> ReconcileOutcome {
        if self.tasks.shift_remove(id).is_none() {
            return ReconcileOutcome::Unchanged;
        }
        self.placements.remove(id);
        self.refresh()
    }

    /// Render `id` under `status` until the next rebuild or rollback
    pub fn stage(&mut self, id: TaskId, status: TaskStatus) {
        self.placements.insert(id, status);
    }

    /// Drop the optimistic placement for `id`, falling back to the server state
    pub fn rollback(&mut self, id: &TaskId) {
        self.placements.remove(id);
    }

    pub fn has_pending(&self) -> bool {
        !self.placements.is_empty()
    }

    /// Status a task currently renders under
    pub fn placement(&self, id: &TaskId) -> Option<TaskStatus> {
        self.placements
            .get(id)
            .copied()
            .or_else(|| self.tasks.get(id).map(|t| t.status))
    }

    pub fn visible_rows(&self, filters: &Filters, expanded: &ExpandState) -> Vec<Row> {
        rows_for_forest(&self.forest, filters, expanded)
    }

    /// Tasks grouped into status columns, honouring optimistic placement
    pub fn board(&self) -> Vec<Column> {
        TaskStatus::ALL
            .iter()
            .map(|&status| Column {
                status,
                tasks: self
                    .tasks
                    .values()
                    .filter(|t| self.placement(&t.id) == Some(status))
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    fn refresh(&mut self) -> ReconcileOutcome {
        let signature = Signature::of(self.tasks.values());
        if self.signature == Some(signature) {
            // passthrough fields changed; the tree still needs the new copies
            self.forest = build_forest_bounded(&self.task_vec(), self.max_depth);
            return ReconcileOutcome::Unchanged;
        }
        self.rebuild(signature)
    }

    fn rebuild(&mut self, signature: Signature) -> ReconcileOutcome {
        self.forest = build_forest_bounded(&self.task_vec(), self.max_depth);
        if !self.placements.is_empty() {
            tracing::debug!(dropped = self.placements.len(), "discarding optimistic placements");
        }
        self.placements.clear();
        self.signature = Some(signature);
        tracing::debug!(%signature, tasks = self.tasks.len(), "rebuilt task tree");
        ReconcileOutcome::Rebuilt
    }

    fn task_vec(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }
}
