//! Application-wide constants

/// Source tag attached to operator notifications emitted by reconciliation
pub(crate) const NOTIFICATION_SOURCE: &str = "AutoLists";

/// Default attempt budget for a single reconciliation dispatch
pub(crate) const DEFAULT_RECONCILE_MAX_ATTEMPTS: u32 = 3;

/// Default fixed backoff between reconciliation attempts
pub(crate) const DEFAULT_RECONCILE_RETRY_DELAY_MS: u64 = 3000;

/// Metric keys
pub(crate) const METRIC_STATUS_RECEIVED: &str = "status.received";
pub(crate) const METRIC_STATUS_IGNORED: &str = "status.ignored";
pub(crate) const METRIC_DEDUP_HIT: &str = "dedup.hit";
pub(crate) const METRIC_RECONCILE_DISPATCHED: &str = "reconcile.dispatched";
pub(crate) const METRIC_RECONCILE_ADDED: &str = "reconcile.added";
pub(crate) const METRIC_RECONCILE_ALREADY_MEMBER: &str = "reconcile.already_member";
pub(crate) const METRIC_RECONCILE_ATTEMPT_FAILED: &str = "reconcile.attempt_failed";
pub(crate) const METRIC_RECONCILE_EXHAUSTED: &str = "reconcile.exhausted";
pub(crate) const METRIC_RECONCILE_DURATION: &str = "reconcile.duration";
pub(crate) const METRIC_DEDUP_CLAIMS: &str = "dedup.claims";
