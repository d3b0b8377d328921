use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::task::{Task, TaskId, TaskStatus};
use crate::model::tree::TaskNode;
use crate::model::view_state::Selection;
use crate::ops::complete::can_complete;
use crate::ops::transition::{
    Feedback, TransitionError, TransitionOrchestrator, TransitionOutcome,
};

/// Counts for a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub success_count: usize,
    pub failure_count: usize,
    /// Unchanged or declined items
    pub skipped_count: usize,
    /// Every task the server acknowledged, in request order
    pub acknowledged: Vec<Task>,
    pub failures: Vec<(TaskId, TransitionError)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Another batch is in flight; this call did nothing
    Busy,
    /// Target was DONE and these selected tasks cannot complete; nothing sent
    Blocked { blocking: Vec<TaskId> },
    Finished(BulkSummary),
}

impl BulkOutcome {
    pub fn feedback(&self) -> Feedback {
        match self {
            BulkOutcome::Busy => Feedback::info("a bulk update is already running"),
            BulkOutcome::Blocked { blocking } => Feedback::warning(format!(
                "{} selected task(s) have open subtasks; complete child tasks first",
                blocking.len()
            )),
            BulkOutcome::Finished(summary) => {
                let message = format!(
                    "{} updated, {} failed, {} skipped",
                    summary.success_count, summary.failure_count, summary.skipped_count
                );
                if summary.failure_count > 0 {
                    Feedback::error(message)
                } else {
                    Feedback::info(message)
                }
            }
        }
    }
}

/// Runs one status change over a selection, one item at a time.
pub struct BulkOrchestrator {
    transitions: TransitionOrchestrator,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the batch ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BulkOrchestrator {
    pub fn new(transitions: TransitionOrchestrator) -> Self {
        BulkOrchestrator {
            transitions,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn transitions(&self) -> &TransitionOrchestrator {
        &self.transitions
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Apply `new_status` to `nodes` strictly in order, awaiting each item.
    ///
    /// A DONE target is all-or-nothing: if any node cannot complete, nothing
    /// is sent. Other targets tolerate per-item failures. The selection is
    /// cleared when the call finishes, unless it was ignored as re-entrant.
    pub async fn request_bulk_transition(
        &self,
        nodes: &[&TaskNode],
        new_status: TaskStatus,
        selection: &mut Selection,
    ) -> BulkOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("bulk transition ignored: batch already in flight");
            return BulkOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        let outcome = self.run(nodes, new_status).await;
        selection.clear();
        outcome
    }

    async fn run(&self, nodes: &[&TaskNode], new_status: TaskStatus) -> BulkOutcome {
        if new_status == TaskStatus::Done {
            let blocking: Vec<TaskId> = nodes
                .iter()
                .filter(|n| !can_complete(n))
                .map(|n| n.id().clone())
                .collect();
            if !blocking.is_empty() {
                tracing::info!(blocked = blocking.len(), "bulk completion aborted: open subtasks");
                return BulkOutcome::Blocked { blocking };
            }
        }

        let mut summary = BulkSummary::default();
        for node in nodes {
            // already moved by an earlier item's cascade; the node snapshot is stale
            if summary
                .acknowledged
                .iter()
                .any(|t| &t.id == node.id() && t.status == new_status)
            {
                tracing::debug!(id = %node.id(), "bulk item already reset by a cascade");
                summary.skipped_count += 1;
                continue;
            }
            match self.transitions.request_transition(node, new_status).await {
                Ok(outcome @ (TransitionOutcome::Applied(_) | TransitionOutcome::Cascaded { .. })) => {
                    summary.success_count += 1;
                    summary
                        .acknowledged
                        .extend(outcome.acknowledged().into_iter().cloned());
                }
                Ok(TransitionOutcome::Unchanged | TransitionOutcome::Declined) => {
                    summary.skipped_count += 1;
                }
                Ok(TransitionOutcome::Rejected { .. }) => {
                    // children changed under us since the precheck
                    summary.failure_count += 1;
                }
                Err(e) => {
                    summary.failure_count += 1;
                    summary
                        .acknowledged
                        .extend(e.acknowledged().into_iter().cloned());
                    summary.failures.push((node.id().clone(), e));
                }
            }
        }

        tracing::info!(
            status = %new_status,
            success = summary.success_count,
            failure = summary.failure_count,
            skipped = summary.skipped_count,
            "bulk transition finished"
        );
        BulkOutcome::Finished(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::model::config::CascadeConfig;
    use crate::ops::tree_ops::build_forest;
    use crate::sync::service::AutoConfirm;
    use crate::sync::test_helpers::FakeService;
    use pretty_assertions::assert_eq;

    fn bulk(service: &Arc<FakeService>) -> BulkOrchestrator {
        BulkOrchestrator::new(TransitionOrchestrator::new(
            service.clone(),
            Arc::new(AutoConfirm(true)),
            CascadeConfig::default(),
        ))
    }

    fn selection_of(ids: &[i32]) -> Selection {
        ids.iter().map(|i| TaskId::from(*i)).collect()
    }

    fn tasks() -> Vec<Task> {
        vec![
            Task::new(1, "Leaf A"),
            Task::new(2, "Parent B"),
            Task::new(3, "Open child").with_parent(2),
            Task::new(4, "Leaf C").with_status(TaskStatus::InProgress),
        ]
    }

    #[tokio::test]
    async fn done_batch_is_all_or_nothing() {
        let tasks = tasks();
        let service = Arc::new(FakeService::with_tasks(&tasks));
        let orch = bulk(&service);
        let forest = build_forest(&tasks);
        let mut selection = selection_of(&[1, 2]);
        let nodes = selection.resolve(&forest);

        let outcome = orch
            .request_bulk_transition(&nodes, TaskStatus::Done, &mut selection)
            .await;
        assert_eq!(
            outcome,
            BulkOutcome::Blocked {
                blocking: vec![TaskId::from(2)]
            }
        );
        assert!(service.calls().is_empty());
        assert!(selection.is_empty());
    }

    #[tokio::test]
    async fn partial_failure_is_tolerated_for_other_targets() {
        let tasks = tasks();
        let service = Arc::new(FakeService::with_tasks(&tasks));
        service.fail_always(1);
        let orch = bulk(&service);
        let forest = build_forest(&tasks);
        let mut selection = selection_of(&[1, 4]);
        let nodes = selection.resolve(&forest);

        let outcome = orch
            .request_bulk_transition(&nodes, TaskStatus::Todo, &mut selection)
            .await;
        let BulkOutcome::Finished(summary) = outcome else {
            panic!("expected finished batch");
        };
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.failures[0].0, TaskId::from(1));
        assert_eq!(service.calls().len(), 2);
        assert_eq!(service.status_of(4), Some(TaskStatus::Todo));
        assert!(selection.is_empty());
    }

    #[tokio::test]
    async fn items_run_in_order_and_unchanged_are_skipped() {
        let tasks = tasks();
        let service = Arc::new(FakeService::with_tasks(&tasks).yielding());
        let orch = bulk(&service);
        let forest = build_forest(&tasks);
        let mut selection = selection_of(&[4, 1, 3]);
        let nodes = selection.resolve(&forest);

        let outcome = orch
            .request_bulk_transition(&nodes, TaskStatus::InProgress, &mut selection)
            .await;
        assert_eq!(
            service.calls(),
            vec![
                ("1".into(), TaskStatus::InProgress),
                ("3".into(), TaskStatus::InProgress),
            ]
        );
        let BulkOutcome::Finished(summary) = outcome else {
            panic!("expected finished batch");
        };
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(
            outcome_feedback(&summary),
            "2 updated, 0 failed, 1 skipped"
        );
    }

    fn outcome_feedback(summary: &BulkSummary) -> String {
        BulkOutcome::Finished(summary.clone()).feedback().message
    }

    #[tokio::test]
    async fn reentrant_call_is_ignored() {
        let tasks = tasks();
        let service = Arc::new(FakeService::with_tasks(&tasks).yielding());
        let orch = bulk(&service);
        let forest = build_forest(&tasks);

        let mut first_sel = selection_of(&[1, 4]);
        let first_nodes = first_sel.resolve(&forest);
        let mut second_sel = selection_of(&[2]);
        let second_nodes = second_sel.resolve(&forest);

        let (first, second) = tokio::join!(
            orch.request_bulk_transition(&first_nodes, TaskStatus::Done, &mut first_sel),
            orch.request_bulk_transition(&second_nodes, TaskStatus::InProgress, &mut second_sel),
        );

        assert!(matches!(first, BulkOutcome::Finished(ref s) if s.success_count == 2));
        assert_eq!(second, BulkOutcome::Busy);
        // ignored call keeps its selection
        assert_eq!(second_sel.len(), 1);
        assert!(first_sel.is_empty());
        assert_eq!(service.status_of(2), Some(TaskStatus::Todo));
        assert!(!orch.is_busy());
    }

    #[tokio::test]
    async fn descendant_reset_by_parent_cascade_is_not_sent_again() {
        let tasks = vec![
            Task::new(1, "Root").with_status(TaskStatus::Done),
            Task::new(2, "Middle").with_parent(1).with_status(TaskStatus::Done),
            Task::new(3, "Leaf").with_parent(2).with_status(TaskStatus::Done),
        ];
        let service = Arc::new(FakeService::with_tasks(&tasks));
        let orch = bulk(&service);
        let forest = build_forest(&tasks);
        let mut selection = selection_of(&[1, 2]);
        let nodes = selection.resolve(&forest);

        let outcome = orch
            .request_bulk_transition(&nodes, TaskStatus::Todo, &mut selection)
            .await;
        let BulkOutcome::Finished(summary) = outcome else {
            panic!("expected finished batch");
        };
        // root + two descendants, nothing for the middle task on its own
        assert_eq!(service.calls().len(), 3);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(service.status_of(3), Some(TaskStatus::Todo));
    }

    #[tokio::test]
    async fn empty_selection_finishes_with_zero_counts() {
        let service = Arc::new(FakeService::default());
        let orch = bulk(&service);
        let mut selection = Selection::default();
        let outcome = orch
            .request_bulk_transition(&[], TaskStatus::Done, &mut selection)
            .await;
        assert_eq!(outcome, BulkOutcome::Finished(BulkSummary::default()));
    }
}
