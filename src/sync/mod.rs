pub mod listener;
pub mod reconcile;
pub mod service;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use listener::{ChannelState, RealtimeEvent, UpdateListener};
pub use reconcile::{Column, ReconcileOutcome, Reconciler, Signature};
pub use service::{AutoConfirm, Confirmer, ServiceError, TaskService, TaskSource};
