use async_trait::async_trait;
use cadence::{
    BufferedUdpMetricSink, Counted, CountedExt, Gauged, Metric, QueuingMetricSink, StatsdClient,
    Timed,
};
use std::net::UdpSocket;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Publishes counters, gauges and timings for the reconciliation engine
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    /// Increment a counter by 1
    async fn incr(&self, key: &str);

    /// Increment a counter by a specific value
    async fn count(&self, key: &str, value: u64);

    /// Increment a counter with tags
    async fn incr_with_tags(&self, key: &str, tags: &[(&str, &str)]);

    /// Record a gauge value
    async fn gauge(&self, key: &str, value: u64);

    /// Record a timing in milliseconds
    async fn time(&self, key: &str, millis: u64);
}

/// No-op implementation for development and testing
#[derive(Debug, Clone, Default)]
pub struct NoOpMetricsPublisher;

impl NoOpMetricsPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsPublisher for NoOpMetricsPublisher {
    async fn incr(&self, _key: &str) {}
    async fn count(&self, _key: &str, _value: u64) {}
    async fn incr_with_tags(&self, _key: &str, _tags: &[(&str, &str)]) {}
    async fn gauge(&self, _key: &str, _value: u64) {}
    async fn time(&self, _key: &str, _millis: u64) {}
}

/// Statsd-backed metrics publisher using cadence
pub struct StatsdMetricsPublisher {
    client: StatsdClient,
    default_tags: Vec<(String, String)>,
}

impl StatsdMetricsPublisher {
    pub fn new(
        host: &str,
        prefix: &str,
        default_tags: Vec<(String, String)>,
    ) -> Result<Self, MetricsError> {
        tracing::info!(
            host = %host,
            prefix = %prefix,
            tags = ?default_tags,
            "Creating StatsdMetricsPublisher"
        );

        let creation_failed = |e: std::io::Error| MetricsError::CreationFailed(e.to_string());
        let socket = UdpSocket::bind("[::]:0").map_err(creation_failed)?;
        socket.set_nonblocking(true).map_err(creation_failed)?;

        let buffered_sink = BufferedUdpMetricSink::from(host, socket)
            .map_err(|e| MetricsError::CreationFailed(e.to_string()))?;
        let queuing_sink = QueuingMetricSink::builder()
            .with_error_handler(move |error| {
                error!("Failed to send metric via sink: {}", error);
            })
            .build(buffered_sink);
        let client = StatsdClient::from_sink(prefix, queuing_sink);

        Ok(Self {
            client,
            default_tags,
        })
    }

    fn apply_default_tags<'a, M>(
        &'a self,
        mut builder: cadence::MetricBuilder<'a, 'a, M>,
    ) -> cadence::MetricBuilder<'a, 'a, M>
    where
        M: Metric + From<String>,
    {
        for (k, v) in &self.default_tags {
            builder = builder.with_tag(k.as_str(), v.as_str());
        }
        builder
    }
}

#[async_trait]
impl MetricsPublisher for StatsdMetricsPublisher {
    async fn incr(&self, key: &str) {
        debug!("Sending metric incr: {}", key);
        if self.default_tags.is_empty() {
            if let Err(e) = self.client.incr(key) {
                error!("Failed to send metric {}: {}", key, e);
            }
        } else {
            let builder = self.client.incr_with_tags(key);
            let _ = self.apply_default_tags(builder).send();
        }
    }

    async fn count(&self, key: &str, value: u64) {
        if self.default_tags.is_empty() {
            let _ = self.client.count(key, value);
        } else {
            let builder = self.client.count_with_tags(key, value);
            let _ = self.apply_default_tags(builder).send();
        }
    }

    async fn incr_with_tags(&self, key: &str, tags: &[(&str, &str)]) {
        let mut builder = self.apply_default_tags(self.client.incr_with_tags(key));
        for (k, v) in tags {
            builder = builder.with_tag(k, v);
        }
        let _ = builder.send();
    }

    async fn gauge(&self, key: &str, value: u64) {
        if self.default_tags.is_empty() {
            if let Err(e) = self.client.gauge(key, value) {
                error!("Failed to send gauge {} = {}: {}", key, value, e);
            }
        } else {
            let builder = self.client.gauge_with_tags(key, value);
            let _ = self.apply_default_tags(builder).send();
        }
    }

    async fn time(&self, key: &str, millis: u64) {
        if self.default_tags.is_empty() {
            let _ = self.client.time(key, millis);
        } else {
            let builder = self.client.time_with_tags(key, millis);
            let _ = self.apply_default_tags(builder).send();
        }
    }
}

/// Type alias for shared metrics publisher
pub type SharedMetricsPublisher = Arc<dyn MetricsPublisher>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("error-autolists-metrics-1 Failed to create metrics publisher: {0}")]
    CreationFailed(String),

    #[error("error-autolists-metrics-2 Invalid metrics configuration: {0}")]
    InvalidConfig(String),
}

/// Parse comma-separated `key:value` pairs, skipping malformed entries.
fn parse_tags(tags: &str) -> Vec<(String, String)> {
    tags.split(',')
        .filter(|tag| !tag.trim().is_empty())
        .filter_map(|tag| match tag.trim().split_once(':') {
            Some((k, v)) if !k.is_empty() && !v.is_empty() && !v.contains(':') => {
                Some((k.to_string(), v.to_string()))
            }
            _ => {
                error!("Invalid tag format: {}", tag);
                None
            }
        })
        .collect()
}

/// Create a metrics publisher for the `METRICS_ADAPTER` setting.
pub fn create_metrics_publisher(
    metrics_adapter: &str,
    metrics_statsd_host: Option<&str>,
    metrics_prefix: &str,
    metrics_tags: Option<&str>,
) -> Result<SharedMetricsPublisher, MetricsError> {
    match metrics_adapter {
        "noop" | "" => Ok(Arc::new(NoOpMetricsPublisher::new())),
        "statsd" => {
            let host = metrics_statsd_host.ok_or_else(|| {
                MetricsError::InvalidConfig(
                    "METRICS_STATSD_HOST is required when using statsd adapter".to_string(),
                )
            })?;
            let default_tags = metrics_tags.map(parse_tags).unwrap_or_default();

            let publisher = StatsdMetricsPublisher::new(host, metrics_prefix, default_tags)?;
            Ok(Arc::new(publisher))
        }
        _ => Err(MetricsError::InvalidConfig(format!(
            "Unknown metrics adapter: {}",
            metrics_adapter
        ))),
    }
}

/// Records the elapsed time of an operation when finished.
pub struct MetricTimer {
    start: tokio::time::Instant,
    metric: &'static str,
    publisher: SharedMetricsPublisher,
}

impl MetricTimer {
    pub fn new(metric: &'static str, publisher: SharedMetricsPublisher) -> Self {
        Self {
            start: tokio::time::Instant::now(),
            metric,
            publisher,
        }
    }

    pub async fn record(self) {
        let elapsed = self.start.elapsed().as_millis() as u64;
        self.publisher.time(self.metric, elapsed).await;
    }
}
