//! Operator notification sink.
//!
//! Notifications are free-text messages tagged with the component that produced
//! them. They are fire-and-forget: a sink never reports back whether a message
//! was delivered, and emitting one never blocks reconciliation.

use std::sync::Arc;

/// Accepts operator-facing messages from the reconciliation engine.
pub trait NotificationSink: Send + Sync {
    /// Emit a message attributed to `source`.
    fn notify(&self, source: &str, message: &str);
}

/// Type alias for a shared notification sink
pub type SharedNotificationSink = Arc<dyn NotificationSink>;

/// Renders notifications as structured `tracing` events.
#[derive(Debug, Clone, Default)]
pub struct TracingNotificationSink;

impl TracingNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, source: &str, message: &str) {
        tracing::info!(notification.source = %source, "{}", message);
    }
}
