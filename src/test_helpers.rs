//! Test helper utilities for autolists tests
//!
//! In-memory collaborators that script remote responses and record what the
//! engine asked of them.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::errors::ListError;
use crate::feed::Status;
use crate::lists::{ListMode, ListService, Membership};
use crate::metrics::MetricsPublisher;
use crate::notify::NotificationSink;
use crate::tasks::{ReconciliationDispatcher, ReconciliationJob};

// Test environment mutex to prevent concurrent environment variable modification
pub static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Build a status with the given id, text and author id.
pub fn status(id: i64, text: &str, author_id: i64) -> Status {
    Status::new(id, text, author_id, format!("user{}", author_id))
}

/// A call observed by [`ScriptedListService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListCall {
    Membership(String, i64),
    AddMember(String, i64),
    CreateList(String, ListMode),
}

/// A scripted remote answer; `Err` carries the HTTP status to fail with.
pub type Scripted<T> = Result<T, u16>;

/// List service answering from scripted queues.
///
/// Once a queue is drained every membership lookup answers `NotMember`
/// and every add succeeds.
#[derive(Default)]
pub struct ScriptedListService {
    membership: Mutex<VecDeque<Scripted<Membership>>>,
    add_member: Mutex<VecDeque<Scripted<()>>>,
    create_list_status: Mutex<Option<u16>>,
    calls: Mutex<Vec<ListCall>>,
}

impl ScriptedListService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_membership(&self, answer: Scripted<Membership>) {
        self.membership.lock().push_back(answer);
    }

    pub fn push_add_member(&self, answer: Scripted<()>) {
        self.add_member.lock().push_back(answer);
    }

    pub fn fail_create_list(&self, status: u16) {
        *self.create_list_status.lock() = Some(status);
    }

    pub fn calls(&self) -> Vec<ListCall> {
        self.calls.lock().clone()
    }

    pub fn add_member_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ListCall::AddMember(..)))
            .count()
    }
}

fn scripted_error(operation: &str, status: u16) -> ListError {
    ListError::UnexpectedStatus {
        operation: operation.to_string(),
        status,
    }
}

#[async_trait]
impl ListService for ScriptedListService {
    async fn membership(&self, list_id: &str, user_id: i64) -> Result<Membership, ListError> {
        self.calls
            .lock()
            .push(ListCall::Membership(list_id.to_string(), user_id));
        let answer = self
            .membership
            .lock()
            .pop_front()
            .unwrap_or(Ok(Membership::NotMember));
        answer.map_err(|status| scripted_error("membership", status))
    }

    async fn add_member(&self, list_id: &str, user_id: i64) -> Result<(), ListError> {
        self.calls
            .lock()
            .push(ListCall::AddMember(list_id.to_string(), user_id));
        let answer = self.add_member.lock().pop_front().unwrap_or(Ok(()));
        answer.map_err(|status| scripted_error("add_member", status))
    }

    async fn create_list(&self, name: &str, mode: ListMode) -> Result<(), ListError> {
        self.calls
            .lock()
            .push(ListCall::CreateList(name.to_string(), mode));
        match *self.create_list_status.lock() {
            Some(status) => Err(scripted_error("create_list", status)),
            None => Ok(()),
        }
    }
}

/// Notification sink keeping every message in order.
#[derive(Default)]
pub struct RecordingNotificationSink {
    entries: Mutex<Vec<(String, String)>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn sources(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|(source, _)| source.clone())
            .collect()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify(&self, source: &str, message: &str) {
        self.entries
            .lock()
            .push((source.to_string(), message.to_string()));
    }
}

/// Dispatcher that records jobs instead of running them.
#[derive(Default)]
pub struct RecordingDispatcher {
    jobs: Mutex<Vec<ReconciliationJob>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<ReconciliationJob> {
        self.jobs.lock().clone()
    }

    /// Dispatched `(list, author)` pairs in dispatch order.
    pub fn pairs(&self) -> Vec<(String, i64)> {
        self.jobs
            .lock()
            .iter()
            .map(|job| (job.list_id.clone(), job.author_id))
            .collect()
    }
}

impl ReconciliationDispatcher for RecordingDispatcher {
    fn dispatch(&self, job: ReconciliationJob) {
        self.jobs.lock().push(job);
    }
}

/// Metrics publisher that keeps counters and timings in memory.
#[derive(Default)]
pub struct RecordingMetricsPublisher {
    counters: Mutex<HashMap<String, u64>>,
    gauges: Mutex<HashMap<String, u64>>,
    timings: Mutex<HashMap<String, Vec<u64>>>,
    tags: Mutex<HashMap<String, Vec<Vec<(String, String)>>>>,
}

impl RecordingMetricsPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.counters.lock().get(key).copied().unwrap_or(0)
    }

    pub fn gauge_value(&self, key: &str) -> Option<u64> {
        self.gauges.lock().get(key).copied()
    }

    pub fn timings(&self, key: &str) -> Vec<u64> {
        self.timings.lock().get(key).cloned().unwrap_or_default()
    }

    /// Tags of every tagged increment of `key`, in call order.
    pub fn tags(&self, key: &str) -> Vec<Vec<(String, String)>> {
        self.tags.lock().get(key).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl MetricsPublisher for RecordingMetricsPublisher {
    async fn incr(&self, key: &str) {
        self.count(key, 1).await;
    }

    async fn count(&self, key: &str, value: u64) {
        *self.counters.lock().entry(key.to_string()).or_insert(0) += value;
    }

    async fn incr_with_tags(&self, key: &str, tags: &[(&str, &str)]) {
        let tags = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.tags.lock().entry(key.to_string()).or_default().push(tags);
        self.incr(key).await;
    }

    async fn gauge(&self, key: &str, value: u64) {
        self.gauges.lock().insert(key.to_string(), value);
    }

    async fn time(&self, key: &str, millis: u64) {
        self.timings
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(millis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_list_service_defaults() {
        let lists = ScriptedListService::new();
        lists.push_membership(Err(500));

        assert!(lists.membership("bots", 1).await.is_err());
        assert_eq!(
            lists.membership("bots", 1).await.unwrap(),
            Membership::NotMember
        );
        lists.add_member("bots", 1).await.unwrap();
        assert_eq!(lists.calls().len(), 3);
        assert_eq!(lists.add_member_calls(), 1);
    }

    #[tokio::test]
    async fn test_recording_metrics_publisher() {
        let metrics = RecordingMetricsPublisher::new();

        metrics.incr("reconcile.added").await;
        metrics.count("reconcile.added", 5).await;
        assert_eq!(metrics.counter("reconcile.added"), 6);

        metrics.gauge("dedup.claims", 3).await;
        assert_eq!(metrics.gauge_value("dedup.claims"), Some(3));
    }
}
