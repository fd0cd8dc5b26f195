//! Status feed types delivered to the event processor.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub mod poller;

pub use poller::{FeedPoller, HttpTimelineSource, TimelineSource};

/// Receiver for `FeedEvent` instances produced by a feed source.
pub type FeedEventReceiver = mpsc::Receiver<FeedEvent>;

/// Sender half paired with [`FeedEventReceiver`].
pub type FeedEventSender = mpsc::Sender<FeedEvent>;

/// A status post observed on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Feed-unique identifier, increasing over time
    pub id: i64,
    /// Post body matched against rules
    pub text: String,
    /// Numeric id of the author
    pub author_id: i64,
    /// Display handle of the author, used in notifications
    pub author_handle: String,
}

impl Status {
    pub fn new(
        id: i64,
        text: impl Into<String>,
        author_id: i64,
        author_handle: impl Into<String>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            author_id,
            author_handle: author_handle.into(),
        }
    }
}

/// Events delivered by a feed source.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A batch of statuses retrieved in one fetch.
    Batch {
        /// Statuses in stream order
        statuses: Vec<Status>,
        /// Set only on the very first batch retrieved after startup
        initial_fetch: bool,
    },
    /// A single status delivered as it arrives.
    Status(Status),
}
