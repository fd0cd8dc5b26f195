//! Event processing: backlog suppression, rule evaluation and dedup claims.
//!
//! The [`EventProcessor`] consumes feed events one at a time, in stream order.
//! It is the only owner of [`DedupState`], so claiming a `(list, author)` pair
//! is a plain insert-if-absent on a set it holds exclusively. Reconciliation is
//! handed to a [`ReconciliationDispatcher`] and never awaited.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::constants::{
    METRIC_DEDUP_CLAIMS, METRIC_DEDUP_HIT, METRIC_RECONCILE_DISPATCHED, METRIC_STATUS_IGNORED,
    METRIC_STATUS_RECEIVED,
};
use crate::feed::{FeedEvent, FeedEventReceiver, Status};
use crate::metrics::SharedMetricsPublisher;
use crate::rules::RuleSet;
use crate::tasks::{ReconciliationJob, SharedReconciliationDispatcher};

/// Process-lifetime dedup bookkeeping. Nothing is ever removed.
#[derive(Debug, Default)]
pub struct DedupState {
    /// Status ids seen in the initial backlog
    ignored_status_ids: HashSet<i64>,
    /// Authors already claimed for reconciliation, per list
    scheduled_members: HashMap<String, HashSet<i64>>,
}

impl DedupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_backlog(&mut self, status_ids: impl IntoIterator<Item = i64>) {
        self.ignored_status_ids.extend(status_ids);
    }

    pub fn is_ignored(&self, status_id: i64) -> bool {
        self.ignored_status_ids.contains(&status_id)
    }

    /// Make sure a claim set exists for `list_id`.
    pub fn ensure_list(&mut self, list_id: &str) {
        self.scheduled_members.entry(list_id.to_string()).or_default();
    }

    /// Claim `(list_id, author_id)`. Returns `false` if it was already claimed.
    pub fn claim(&mut self, list_id: &str, author_id: i64) -> bool {
        self.ensure_list(list_id);
        self.scheduled_members
            .get_mut(list_id)
            .is_some_and(|members| members.insert(author_id))
    }

    pub fn is_claimed(&self, list_id: &str, author_id: i64) -> bool {
        self.scheduled_members
            .get(list_id)
            .is_some_and(|members| members.contains(&author_id))
    }

    /// Total claims across all lists.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled_members.values().map(HashSet::len).sum()
    }

    pub fn list_count(&self) -> usize {
        self.scheduled_members.len()
    }

    pub fn ignored_count(&self) -> usize {
        self.ignored_status_ids.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorPhase {
    /// No batch has been seen yet; the next initial batch is the backlog.
    AwaitingFirstBatch,
    SteadyState,
}

/// Matches feed events against the current rules and dispatches reconciliations.
pub struct EventProcessor {
    rules: watch::Receiver<Arc<RuleSet>>,
    dispatcher: SharedReconciliationDispatcher,
    metrics: SharedMetricsPublisher,
    dedup: DedupState,
    phase: ProcessorPhase,
}

impl EventProcessor {
    pub fn new(
        rules: watch::Receiver<Arc<RuleSet>>,
        dispatcher: SharedReconciliationDispatcher,
        metrics: SharedMetricsPublisher,
    ) -> Self {
        Self {
            rules,
            dispatcher,
            metrics,
            dedup: DedupState::new(),
            phase: ProcessorPhase::AwaitingFirstBatch,
        }
    }

    pub fn phase(&self) -> ProcessorPhase {
        self.phase
    }

    pub fn dedup(&self) -> &DedupState {
        &self.dedup
    }

    /// Consume events until the channel closes or the token is cancelled.
    pub async fn start_processing(
        &mut self,
        mut event_receiver: FeedEventReceiver,
        cancel_token: CancellationToken,
    ) -> anyhow::Result<()> {
        info!("Starting list reconciliation processor");

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Processor shutting down");
                    break;
                }
                event = event_receiver.recv() => {
                    let Some(event) = event else {
                        info!("Feed channel closed, processor stopping");
                        break;
                    };
                    self.handle_event(event).await;
                }
            }
        }

        info!(
            claims = self.dedup.scheduled_count(),
            lists = self.dedup.list_count(),
            ignored = self.dedup.ignored_count(),
            "Processor stopped"
        );
        Ok(())
    }

    /// Process one feed event, returning how many reconciliations were dispatched.
    pub async fn handle_event(&mut self, event: FeedEvent) -> usize {
        let dispatched = match event {
            FeedEvent::Batch {
                statuses,
                initial_fetch: true,
            } => {
                self.suppress_backlog(&statuses).await;
                0
            }
            FeedEvent::Batch {
                statuses,
                initial_fetch: false,
            } => {
                self.phase = ProcessorPhase::SteadyState;
                let mut dispatched = 0;
                for status in &statuses {
                    dispatched += self.handle_status(status).await;
                }
                dispatched
            }
            FeedEvent::Status(status) => {
                self.phase = ProcessorPhase::SteadyState;
                self.handle_status(&status).await
            }
        };

        if dispatched > 0 {
            self.metrics
                .gauge(METRIC_DEDUP_CLAIMS, self.dedup.scheduled_count() as u64)
                .await;
        }
        dispatched
    }

    async fn suppress_backlog(&mut self, statuses: &[Status]) {
        self.metrics
            .count(METRIC_STATUS_IGNORED, statuses.len() as u64)
            .await;

        if self.phase == ProcessorPhase::AwaitingFirstBatch {
            self.dedup.ignore_backlog(statuses.iter().map(|s| s.id));
            self.phase = ProcessorPhase::SteadyState;
            info!(
                backlog = statuses.len(),
                "Initial backlog recorded, reconciliation starts with the next event"
            );
        } else {
            warn!(
                count = statuses.len(),
                "Initial-fetch batch received after startup, suppressing without recording"
            );
        }
    }

    async fn handle_status(&mut self, status: &Status) -> usize {
        self.metrics.incr(METRIC_STATUS_RECEIVED).await;

        if self.dedup.is_ignored(status.id) {
            trace!(status.id = status.id, "Dropping backlog status");
            self.metrics.incr(METRIC_STATUS_IGNORED).await;
            return 0;
        }

        // Latest snapshot, read once per status
        let rules = self.rules.borrow_and_update().clone();
        let mut dispatched = 0;

        for rule in rules.iter() {
            if rule.is_inert() {
                continue;
            }
            let list_id = rule.list_id();
            self.dedup.ensure_list(list_id);

            if !rule.is_match(status) {
                continue;
            }

            if !self.dedup.claim(list_id, status.author_id) {
                debug!(
                    list.id = %list_id,
                    author.id = status.author_id,
                    status.id = status.id,
                    "Author already scheduled for list"
                );
                self.metrics.incr(METRIC_DEDUP_HIT).await;
                continue;
            }

            debug!(
                list.id = %list_id,
                author.id = status.author_id,
                status.id = status.id,
                rules.version = rules.version(),
                "Rule matched, dispatching reconciliation"
            );
            self.dispatcher
                .dispatch(ReconciliationJob::new(list_id, status));
            self.metrics.incr(METRIC_RECONCILE_DISPATCHED).await;
            dispatched += 1;
        }

        dispatched
    }
}
