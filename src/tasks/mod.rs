//! Background work for list reconciliation.
//!
//! - [`reconcile`]: the check-then-add worker with fixed-backoff retry
//! - [`dispatch`]: fire-and-forget submission of claimed jobs to a task tracker
//! - [`manager`]: lifecycle helper for the long-running loops started by the binary

pub mod dispatch;
pub mod manager;
pub mod reconcile;

pub use dispatch::{
    ReconciliationDispatcher, ReconciliationReportReceiver, ReconciliationReportSender,
    SharedReconciliationDispatcher, TaskDispatcher,
};
pub use manager::spawn_cancellable_task;
pub use reconcile::{
    ReconciliationJob, ReconciliationOutcome, ReconciliationReport, Reconciler, RetryPolicy,
};
