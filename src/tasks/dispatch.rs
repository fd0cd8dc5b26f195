//! Fire-and-forget dispatch of reconciliation jobs.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use super::reconcile::{Reconciler, ReconciliationJob, ReconciliationReport};

/// Sender for completed reconciliation reports.
pub type ReconciliationReportSender = mpsc::UnboundedSender<ReconciliationReport>;

/// Receiver paired with [`ReconciliationReportSender`].
pub type ReconciliationReportReceiver = mpsc::UnboundedReceiver<ReconciliationReport>;

/// Hands a claimed job to whatever runs reconciliations.
///
/// `dispatch` must return without waiting on the job; the event processor
/// calls it inline and never blocks on network I/O.
pub trait ReconciliationDispatcher: Send + Sync {
    fn dispatch(&self, job: ReconciliationJob);
}

/// Type alias for a shared dispatcher
pub type SharedReconciliationDispatcher = Arc<dyn ReconciliationDispatcher>;

/// Runs every job as its own task on a [`TaskTracker`].
///
/// There is no bound on concurrently running jobs. Completed jobs are
/// reported on the result channel when one is attached; otherwise their
/// outcome is only visible through notifications and metrics.
pub struct TaskDispatcher {
    reconciler: Arc<Reconciler>,
    tracker: TaskTracker,
    results: Option<ReconciliationReportSender>,
}

impl TaskDispatcher {
    pub fn new(reconciler: Arc<Reconciler>, tracker: TaskTracker) -> Self {
        Self {
            reconciler,
            tracker,
            results: None,
        }
    }

    pub fn with_results(mut self, results: ReconciliationReportSender) -> Self {
        self.results = Some(results);
        self
    }

    /// Number of tasks still tracked, including ones not spawned by this dispatcher.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

impl ReconciliationDispatcher for TaskDispatcher {
    fn dispatch(&self, job: ReconciliationJob) {
        trace!(
            job.id = %job.id,
            list.id = %job.list_id,
            author.id = job.author_id,
            "Dispatching reconciliation"
        );

        let reconciler = self.reconciler.clone();
        let results = self.results.clone();
        self.tracker.spawn(async move {
            let outcome = reconciler.reconcile(&job).await;
            debug!(
                job.id = %job.id,
                attempts = outcome.attempts(),
                success = outcome.is_success(),
                "Reconciliation finished"
            );

            if let Some(results) = results {
                let report = ReconciliationReport {
                    job,
                    outcome,
                    completed_at: Utc::now(),
                };
                if results.send(report).is_err() {
                    debug!("Reconciliation result receiver dropped");
                }
            }
        });
    }
}
