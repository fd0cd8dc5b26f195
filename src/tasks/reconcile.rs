//! Check-then-add reconciliation of a single list membership.
//!
//! A [`Reconciler`] brings one `(list, author)` pair in line with a matched
//! rule: it asks the list service whether the author is already a member and
//! adds them when they are not. Any failure restarts the whole sequence after
//! a fixed backoff, up to the attempt budget of the [`RetryPolicy`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::constants::{
    DEFAULT_RECONCILE_MAX_ATTEMPTS, DEFAULT_RECONCILE_RETRY_DELAY_MS, METRIC_RECONCILE_ADDED,
    METRIC_RECONCILE_ALREADY_MEMBER, METRIC_RECONCILE_ATTEMPT_FAILED, METRIC_RECONCILE_DURATION,
    METRIC_RECONCILE_EXHAUSTED, NOTIFICATION_SOURCE,
};
use crate::errors::ListError;
use crate::feed::Status;
use crate::lists::{Membership, SharedListService};
use crate::metrics::{MetricTimer, SharedMetricsPublisher};
use crate::notify::SharedNotificationSink;

/// A claimed `(list, author)` pair waiting to be reconciled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationJob {
    /// Unique identifier for this dispatch
    pub id: Uuid,

    /// Target list
    pub list_id: String,

    pub author_id: i64,

    /// Display handle used in notifications
    pub author_handle: String,

    /// Status that produced the match
    pub status_id: i64,

    pub matched_at: DateTime<Utc>,
}

impl ReconciliationJob {
    pub fn new(list_id: impl Into<String>, status: &Status) -> Self {
        Self {
            id: Uuid::new_v4(),
            list_id: list_id.into(),
            author_id: status.author_id,
            author_handle: status.author_handle.clone(),
            status_id: status.id,
            matched_at: Utc::now(),
        }
    }
}

/// Attempt budget and fixed backoff for a reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Pause between a failed attempt and the next one
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONCILE_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RECONCILE_RETRY_DELAY_MS),
        }
    }
}

/// How a reconciliation ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// The author was not a member and has been added.
    Added { attempts: u32 },

    /// The author was already a member; no add was issued.
    AlreadyMember { attempts: u32 },

    /// Every attempt failed. The dedup claim stays in place.
    Failed { attempts: u32, last_error: String },
}

impl ReconciliationOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            ReconciliationOutcome::Added { attempts }
            | ReconciliationOutcome::AlreadyMember { attempts }
            | ReconciliationOutcome::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ReconciliationOutcome::Failed { .. })
    }
}

/// Result of a reconciliation, as reported on the dispatcher's result channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub job: ReconciliationJob,
    pub outcome: ReconciliationOutcome,
    pub completed_at: DateTime<Utc>,
}

enum AttemptResult {
    AlreadyMember,
    Added,
}

/// Runs the check-then-add workflow against the remote list service.
pub struct Reconciler {
    lists: SharedListService,
    notifier: SharedNotificationSink,
    metrics: SharedMetricsPublisher,
    policy: RetryPolicy,
}

impl Reconciler {
    pub fn new(
        lists: SharedListService,
        notifier: SharedNotificationSink,
        metrics: SharedMetricsPublisher,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            lists,
            notifier,
            metrics,
            policy,
        }
    }

    /// Reconcile one job to completion.
    ///
    /// Never returns an error: every failed attempt is reported through the
    /// notification sink, and running out of attempts yields
    /// [`ReconciliationOutcome::Failed`].
    #[instrument(skip(self, job), fields(
        job.id = %job.id,
        list.id = %job.list_id,
        author.id = job.author_id,
        status.id = job.status_id,
    ))]
    pub async fn reconcile(&self, job: &ReconciliationJob) -> ReconciliationOutcome {
        let timer = MetricTimer::new(METRIC_RECONCILE_DURATION, self.metrics.clone());
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        let outcome = loop {
            attempt += 1;
            debug!(attempt, max_attempts, "Starting reconciliation attempt");

            match self.attempt(job).await {
                Ok(AttemptResult::AlreadyMember) => {
                    debug!(attempt, "Author is already a member");
                    self.metrics.incr(METRIC_RECONCILE_ALREADY_MEMBER).await;
                    break ReconciliationOutcome::AlreadyMember { attempts: attempt };
                }
                Ok(AttemptResult::Added) => {
                    info!(attempt, "Added author to list");
                    let tags = [("list", job.list_id.as_str())];
                    self.metrics.incr_with_tags(METRIC_RECONCILE_ADDED, &tags).await;
                    self.notifier.notify(
                        NOTIFICATION_SOURCE,
                        &format!("Added {} to list {}", job.author_handle, job.list_id),
                    );
                    break ReconciliationOutcome::Added { attempts: attempt };
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Reconciliation attempt failed");
                    self.metrics.incr(METRIC_RECONCILE_ATTEMPT_FAILED).await;
                    self.notifier.notify(NOTIFICATION_SOURCE, &e.to_string());

                    if attempt >= max_attempts {
                        error!(attempts = attempt, "Reconciliation attempts exhausted");
                        let tags = [("list", job.list_id.as_str())];
                        self.metrics.incr_with_tags(METRIC_RECONCILE_EXHAUSTED, &tags).await;
                        break ReconciliationOutcome::Failed {
                            attempts: attempt,
                            last_error: e.to_string(),
                        };
                    }

                    sleep(self.policy.retry_delay).await;
                }
            }
        };

        timer.record().await;
        outcome
    }

    /// One pass of the existence check followed by a conditional add.
    async fn attempt(&self, job: &ReconciliationJob) -> Result<AttemptResult, ListError> {
        match self.lists.membership(&job.list_id, job.author_id).await? {
            Membership::Member => Ok(AttemptResult::AlreadyMember),
            Membership::NotMember => {
                self.lists.add_member(&job.list_id, job.author_id).await?;
                Ok(AttemptResult::Added)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::test_helpers::{
        ListCall, RecordingMetricsPublisher, RecordingNotificationSink, ScriptedListService,
        status,
    };

    struct Harness {
        lists: Arc<ScriptedListService>,
        sink: Arc<RecordingNotificationSink>,
        metrics: Arc<RecordingMetricsPublisher>,
        reconciler: Reconciler,
    }

    fn harness() -> Harness {
        let lists = Arc::new(ScriptedListService::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        let metrics = Arc::new(RecordingMetricsPublisher::new());
        let reconciler = Reconciler::new(
            lists.clone(),
            sink.clone(),
            metrics.clone(),
            RetryPolicy::default(),
        );
        Harness {
            lists,
            sink,
            metrics,
            reconciler,
        }
    }

    fn job() -> ReconciliationJob {
        ReconciliationJob::new("bots", &status(2, "foo baz", 100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_member_is_added_and_notified() {
        let h = harness();

        let outcome = h.reconciler.reconcile(&job()).await;

        assert_eq!(outcome, ReconciliationOutcome::Added { attempts: 1 });
        assert_eq!(
            h.lists.calls(),
            vec![
                ListCall::Membership("bots".to_string(), 100),
                ListCall::AddMember("bots".to_string(), 100),
            ]
        );
        assert_eq!(h.sink.messages(), vec!["Added user100 to list bots".to_string()]);
        assert_eq!(h.sink.sources(), vec!["AutoLists".to_string()]);
        assert_eq!(h.metrics.counter(METRIC_RECONCILE_ADDED), 1);
        assert_eq!(
            h.metrics.tags(METRIC_RECONCILE_ADDED),
            vec![vec![("list".to_string(), "bots".to_string())]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_member_is_not_added() {
        let h = harness();
        h.lists.push_membership(Ok(Membership::Member));

        let outcome = h.reconciler.reconcile(&job()).await;

        assert_eq!(outcome, ReconciliationOutcome::AlreadyMember { attempts: 1 });
        assert_eq!(h.lists.add_member_calls(), 0);
        assert!(h.sink.messages().is_empty());
        assert_eq!(h.metrics.counter(METRIC_RECONCILE_ALREADY_MEMBER), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_stops_after_three_attempts() {
        let h = harness();
        for _ in 0..5 {
            h.lists.push_membership(Err(503));
        }

        let started = tokio::time::Instant::now();
        let outcome = h.reconciler.reconcile(&job()).await;

        assert!(matches!(
            outcome,
            ReconciliationOutcome::Failed { attempts: 3, .. }
        ));
        assert_eq!(outcome.attempts(), 3);
        assert!(!outcome.is_success());
        // two backoff sleeps between three attempts
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        assert_eq!(h.lists.calls().len(), 3);
        assert_eq!(h.lists.add_member_calls(), 0);

        let messages = h.sink.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.starts_with("error-autolists-list-2")));
        assert_eq!(h.metrics.counter(METRIC_RECONCILE_ATTEMPT_FAILED), 3);
        assert_eq!(h.metrics.counter(METRIC_RECONCILE_EXHAUSTED), 1);
        assert_eq!(
            h.metrics.tags(METRIC_RECONCILE_EXHAUSTED),
            vec![vec![("list".to_string(), "bots".to_string())]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_restarts_from_existence_check() {
        let h = harness();
        h.lists.push_add_member(Err(500));

        let outcome = h.reconciler.reconcile(&job()).await;

        assert_eq!(outcome, ReconciliationOutcome::Added { attempts: 2 });
        assert_eq!(
            h.lists.calls(),
            vec![
                ListCall::Membership("bots".to_string(), 100),
                ListCall::AddMember("bots".to_string(), 100),
                ListCall::Membership("bots".to_string(), 100),
                ListCall::AddMember("bots".to_string(), 100),
            ]
        );
        let messages = h.sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("add_member"));
        assert_eq!(messages[1], "Added user100 to list bots");
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_found_on_retry_skips_add() {
        let h = harness();
        h.lists.push_membership(Ok(Membership::NotMember));
        h.lists.push_add_member(Err(502));
        h.lists.push_membership(Ok(Membership::Member));

        let outcome = h.reconciler.reconcile(&job()).await;

        assert_eq!(outcome, ReconciliationOutcome::AlreadyMember { attempts: 2 });
        assert_eq!(h.lists.add_member_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_is_recorded() {
        let h = harness();
        h.lists.push_membership(Err(500));

        h.reconciler.reconcile(&job()).await;

        assert_eq!(h.metrics.timings(METRIC_RECONCILE_DURATION), vec![3000]);
    }
}
