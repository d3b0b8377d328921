use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::model::task::{Task, TaskId};
use crate::sync::reconcile::{ReconcileOutcome, Reconciler};
use crate::sync::service::{ServiceError, TaskSource};

/// Events delivered by the real-time channel. Delivery is at-least-once
/// and may be out of order relative to fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    TaskUpdated(Task),
    TaskDeleted(TaskId),
    Disconnected,
    /// Channel is back; events may have been missed meanwhile
    Reconnected,
    /// The whole snapshot is stale (e.g. the backing file changed)
    Invalidated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connected,
    Disconnected,
}

/// Create a channel for feeding events to an [`UpdateListener`]
pub fn channel() -> (UnboundedSender<RealtimeEvent>, UnboundedReceiver<RealtimeEvent>) {
    mpsc::unbounded_channel()
}

/// Feeds pushed events into a [`Reconciler`], in arrival order.
///
/// A reconnect or invalidation marks the collection for a full refetch.
/// The mark stays until a refetch succeeds, so a failed one is retried on
/// the next `handle` or `drain`.
pub struct UpdateListener {
    rx: UnboundedReceiver<RealtimeEvent>,
    source: Arc<dyn TaskSource>,
    state: ChannelState,
    needs_resync: bool,
}

impl UpdateListener {
    pub fn new(rx: UnboundedReceiver<RealtimeEvent>, source: Arc<dyn TaskSource>) -> Self {
        UpdateListener {
            rx,
            source,
            state: ChannelState::Connected,
            needs_resync: false,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// A refetch is owed and has not succeeded yet
    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    /// Wait for the next event. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.rx.recv().await
    }

    /// Apply one event, then refetch if one is owed. Reconnects and
    /// invalidations refetch the whole collection rather than trusting
    /// that nothing was missed.
    pub async fn handle(
        &mut self,
        event: RealtimeEvent,
        reconciler: &mut Reconciler,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let outcome = self.apply(event, reconciler);
        let resynced = self.resync_if_needed(reconciler).await?;
        Ok(merge(outcome, resynced))
    }

    /// Handle everything already queued without waiting for more, with at
    /// most one refetch at the end.
    /// Returns how many events were applied and whether anything rebuilt the tree.
    pub async fn drain(&mut self, reconciler: &mut Reconciler) -> Result<(usize, bool), ServiceError> {
        let mut handled = 0;
        let mut outcome = ReconcileOutcome::Unchanged;
        while let Ok(event) = self.rx.try_recv() {
            outcome = merge(outcome, self.apply(event, reconciler));
            handled += 1;
        }
        outcome = merge(outcome, self.resync_if_needed(reconciler).await?);
        Ok((handled, outcome == ReconcileOutcome::Rebuilt))
    }

    fn apply(&mut self, event: RealtimeEvent, reconciler: &mut Reconciler) -> ReconcileOutcome {
        match event {
            RealtimeEvent::TaskUpdated(task) => reconciler.apply_update(task),
            RealtimeEvent::TaskDeleted(id) => reconciler.apply_removal(&id),
            RealtimeEvent::Disconnected => {
                tracing::warn!("real-time channel disconnected");
                self.state = ChannelState::Disconnected;
                ReconcileOutcome::Unchanged
            }
            RealtimeEvent::Reconnected => {
                tracing::info!("real-time channel reconnected, resyncing");
                self.state = ChannelState::Connected;
                self.needs_resync = true;
                ReconcileOutcome::Unchanged
            }
            RealtimeEvent::Invalidated => {
                self.needs_resync = true;
                ReconcileOutcome::Unchanged
            }
        }
    }

    async fn resync_if_needed(
        &mut self,
        reconciler: &mut Reconciler,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if !self.needs_resync {
            return Ok(ReconcileOutcome::Unchanged);
        }
        let tasks = self.source.list_all().await.inspect_err(|e| {
            tracing::warn!(error = %e, "resync failed, will retry on the next event");
        })?;
        self.needs_resync = false;
        Ok(reconciler.apply_snapshot(tasks))
    }
}

fn merge(a: ReconcileOutcome, b: ReconcileOutcome) -> ReconcileOutcome {
    if a == ReconcileOutcome::Rebuilt || b == ReconcileOutcome::Rebuilt {
        ReconcileOutcome::Rebuilt
    } else {
        b
    }
}
