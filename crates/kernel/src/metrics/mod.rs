//! Prometheus metrics collection.
//!
//! Provides collection request metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Label used when a request names no registered collection display.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Collection request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CollectionLabels {
    pub collection: String,
    pub display: String,
    pub status: u16,
}

/// Query engine labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EngineLabels {
    pub engine: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// Collection requests by collection/display/status.
    pub collection_requests: Family<CollectionLabels, Counter>,

    /// Collection request duration histogram.
    pub collection_duration_seconds: Family<CollectionLabels, Histogram>,

    /// Query engine execution duration.
    pub engine_duration_seconds: Family<EngineLabels, Histogram>,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let collection_requests = Family::<CollectionLabels, Counter>::default();
        // Counters get the `_total` suffix on encode.
        registry.register(
            "collection_requests",
            "Total collection requests",
            collection_requests.clone(),
        );

        let collection_duration_seconds =
            Family::<CollectionLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 12))
            });
        registry.register(
            "collection_request_duration_seconds",
            "Collection request duration in seconds",
            collection_duration_seconds.clone(),
        );

        let engine_duration_seconds = Family::<EngineLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.0001, 2.0, 14))
        });
        registry.register(
            "engine_query_duration_seconds",
            "Query engine execution duration in seconds",
            engine_duration_seconds.clone(),
        );

        Self {
            registry,
            collection_requests,
            collection_duration_seconds,
            engine_duration_seconds,
        }
    }

    /// Record a collection request.
    pub fn record_request(&self, collection: &str, display: &str, status: u16, duration_secs: f64) {
        let labels = CollectionLabels {
            collection: collection.to_string(),
            display: display.to_string(),
            status,
        };

        self.collection_requests.get_or_create(&labels).inc();
        self.collection_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a query engine execution.
    pub fn record_engine(&self, engine: &str, duration_secs: f64) {
        let labels = EngineLabels {
            engine: engine.to_string(),
        };
        self.engine_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn records_collection_requests() {
        let metrics = Metrics::new();
        metrics.record_request("rooms", "page", 200, 0.005);
        metrics.record_request("rooms", "page", 200, 0.010);
        metrics.record_request(UNKNOWN_LABEL, UNKNOWN_LABEL, 404, 0.001);

        let output = metrics.encode().unwrap();
        assert!(output.contains("collection_requests_total{"));
        assert!(!output.contains("_total_total"));
        assert!(output.contains("collection=\"rooms\""));
        assert!(output.contains("display=\"page\""));
        assert!(output.contains("status=\"404\""));
        assert!(output.contains("collection_request_duration_seconds"));
    }

    #[test]
    fn records_engine_duration() {
        let metrics = Metrics::new();
        metrics.record_engine("memory", 0.0002);

        let output = metrics.encode().unwrap();
        assert!(output.contains("engine_query_duration_seconds"));
        assert!(output.contains("engine=\"memory\""));
    }
}
