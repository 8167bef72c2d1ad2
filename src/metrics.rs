use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::range::RangeKey;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

/// How a `/api/fires` request was answered.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum CacheStatus {
    Hit,
    Miss,
    Stale,
    Error,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum FetchOutcome {
    Ok,
    HttpStatus,
    EmptyResponse,
    Network,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub range: String,
    pub cache_status: CacheStatus,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FetchLabels {
    pub range: String,
    pub outcome: FetchOutcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RangeLabels {
    pub range: String,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Every Prometheus metric exposed by the proxy.
pub struct Metrics {
    pub requests_total: Family<RequestLabels, Counter>,
    pub upstream_fetch_total: Family<FetchLabels, Counter>,
    pub upstream_fetch_duration_seconds: Histogram,
    pub cache_bytes: Family<RangeLabels, Gauge>,
}

impl Metrics {
    pub fn new(registry: &mut Registry) -> Self {
        let requests_total = Family::<RequestLabels, Counter>::default();
        registry.register(
            "firecache_requests",
            "Fire data requests by range and cache status",
            requests_total.clone(),
        );

        let upstream_fetch_total = Family::<FetchLabels, Counter>::default();
        registry.register(
            "firecache_upstream_fetch",
            "Upstream FIRMS fetch attempts by range and outcome",
            upstream_fetch_total.clone(),
        );

        let upstream_fetch_duration_seconds = Histogram::new(exponential_buckets(0.05, 2.0, 10));
        registry.register(
            "firecache_upstream_fetch_duration_seconds",
            "Upstream FIRMS fetch latency in seconds",
            upstream_fetch_duration_seconds.clone(),
        );

        let cache_bytes = Family::<RangeLabels, Gauge>::default();
        registry.register(
            "firecache_cache_bytes",
            "Size of the cached CSV payload per range",
            cache_bytes.clone(),
        );

        Self {
            requests_total,
            upstream_fetch_total,
            upstream_fetch_duration_seconds,
            cache_bytes,
        }
    }

    pub fn record_request(&self, range: RangeKey, cache_status: CacheStatus) {
        self.requests_total
            .get_or_create(&RequestLabels {
                range: range.as_str().to_string(),
                cache_status,
            })
            .inc();
    }

    pub fn record_fetch(&self, range: RangeKey, outcome: FetchOutcome, seconds: f64) {
        self.upstream_fetch_total
            .get_or_create(&FetchLabels {
                range: range.as_str().to_string(),
                outcome,
            })
            .inc();
        self.upstream_fetch_duration_seconds.observe(seconds);
    }

    pub fn set_cache_bytes(&self, range: RangeKey, size_bytes: usize) {
        self.cache_bytes
            .get_or_create(&RangeLabels {
                range: range.as_str().to_string(),
            })
            .set(size_bytes as i64);
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, held in the app state.
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
