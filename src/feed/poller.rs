//! Timeline polling feed source.
//!
//! The poller fetches the home timeline on a fixed interval and forwards each
//! fetch as a [`FeedEvent::Batch`]. The first successful fetch after startup is
//! flagged `initial_fetch` so the processor can suppress the backlog.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{FeedEvent, FeedEventSender, Status};
use crate::errors::FeedError;

/// A source of timeline statuses.
#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Fetch statuses newer than `since_id`, or the most recent page when `None`.
    async fn fetch(&self, since_id: Option<i64>) -> Result<Vec<Status>, FeedError>;
}

#[derive(Debug, Deserialize)]
struct TimelineEntry {
    id: i64,
    text: String,
    user: TimelineUser,
}

#[derive(Debug, Deserialize)]
struct TimelineUser {
    id: i64,
    screen_name: String,
}

impl From<TimelineEntry> for Status {
    fn from(entry: TimelineEntry) -> Self {
        Status {
            id: entry.id,
            text: entry.text,
            author_id: entry.user.id,
            author_handle: entry.user.screen_name,
        }
    }
}

/// Timeline source backed by the remote `statuses/home_timeline.json` endpoint.
pub struct HttpTimelineSource {
    http_client: reqwest::Client,
    timeline_url: String,
    token: Option<String>,
    count: u32,
}

impl HttpTimelineSource {
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        token: Option<String>,
        count: u32,
    ) -> Self {
        Self {
            http_client,
            timeline_url: format!(
                "{}/statuses/home_timeline.json",
                base_url.trim_end_matches('/')
            ),
            token,
            count,
        }
    }
}

#[async_trait]
impl TimelineSource for HttpTimelineSource {
    async fn fetch(&self, since_id: Option<i64>) -> Result<Vec<Status>, FeedError> {
        let mut request = self
            .http_client
            .get(&self.timeline_url)
            .query(&[("count", self.count.to_string())]);
        if let Some(since_id) = since_id {
            request = request.query(&[("since_id", since_id.to_string())]);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FeedError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }

        let entries: Vec<TimelineEntry> = response.json().await?;
        Ok(entries.into_iter().map(Status::from).collect())
    }
}

/// Polls a [`TimelineSource`] and forwards batches to the processor.
pub struct FeedPoller {
    source: Arc<dyn TimelineSource>,
    sender: FeedEventSender,
    poll_interval: Duration,
}

impl FeedPoller {
    pub fn new(
        source: Arc<dyn TimelineSource>,
        sender: FeedEventSender,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            sender,
            poll_interval,
        }
    }

    /// Run until cancelled or until the receiving side goes away.
    pub async fn run(self, cancel_token: CancellationToken) -> anyhow::Result<()> {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Feed poller started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut since_id: Option<i64> = None;
        let mut initial_fetch = true;

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Feed poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let mut statuses = match self.source.fetch(since_id).await {
                        Ok(statuses) => statuses,
                        Err(e) => {
                            warn!(error = %e, "Timeline fetch failed, will retry on next poll");
                            continue;
                        }
                    };

                    // Timelines are served newest first; the processor wants stream order.
                    statuses.sort_by_key(|status| status.id);
                    if let Some(newest) = statuses.last() {
                        since_id =
                            Some(since_id.map_or(newest.id, |current| current.max(newest.id)));
                    }

                    if statuses.is_empty() && !initial_fetch {
                        debug!("No new statuses");
                        continue;
                    }

                    debug!(
                        count = statuses.len(),
                        initial_fetch = initial_fetch,
                        "Forwarding timeline batch"
                    );
                    let event = FeedEvent::Batch {
                        statuses,
                        initial_fetch,
                    };
                    if self.sender.send(event).await.is_err() {
                        warn!("Feed event receiver closed, stopping poller");
                        break;
                    }
                    initial_fetch = false;
                }
            }
        }

        Ok(())
    }
}
