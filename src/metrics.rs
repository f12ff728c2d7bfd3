use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum CacheKind {
    Tree,
    File,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheLabels {
    pub kind: CacheKind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EndpointLabels {
    pub endpoint: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FailureLabels {
    pub class: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum StreamOutcome {
    Done,
    Error,
    Disconnected,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StreamLabels {
    pub kind: CacheKind,
    pub outcome: StreamOutcome,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Central container for every Prometheus metric exposed by the service.
pub struct Metrics {
    // -- result cache --
    pub cache_hits: Family<CacheLabels, Counter>,
    pub cache_misses: Family<CacheLabels, Counter>,

    // -- upstream API --
    pub upstream_api_calls: Family<EndpointLabels, Counter>,
    pub upstream_api_failures: Family<FailureLabels, Counter>,
    pub upstream_api_rate_limit_remaining: Gauge,
    pub fallback_resolutions: Counter,

    // -- streams --
    pub stream_sessions: Family<StreamLabels, Counter>,
    pub active_streams: Gauge,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let cache_hits = Family::<CacheLabels, Counter>::default();
        registry.register(
            "repo_explorer_cache_hits",
            "Result cache hits by kind",
            cache_hits.clone(),
        );

        let cache_misses = Family::<CacheLabels, Counter>::default();
        registry.register(
            "repo_explorer_cache_misses",
            "Result cache misses by kind",
            cache_misses.clone(),
        );

        let upstream_api_calls = Family::<EndpointLabels, Counter>::default();
        registry.register(
            "repo_explorer_upstream_api_calls",
            "Upstream API call count by endpoint",
            upstream_api_calls.clone(),
        );

        let upstream_api_failures = Family::<FailureLabels, Counter>::default();
        registry.register(
            "repo_explorer_upstream_api_failures",
            "Upstream API failures by class",
            upstream_api_failures.clone(),
        );

        let upstream_api_rate_limit_remaining: Gauge = Gauge::default();
        registry.register(
            "repo_explorer_upstream_api_rate_limit_remaining",
            "Remaining upstream API calls before rate limit",
            upstream_api_rate_limit_remaining.clone(),
        );

        let fallback_resolutions = Counter::default();
        registry.register(
            "repo_explorer_fallback_resolutions",
            "Tree resolutions retried through the branch head commit",
            fallback_resolutions.clone(),
        );

        let stream_sessions = Family::<StreamLabels, Counter>::default();
        registry.register(
            "repo_explorer_stream_sessions",
            "Finished stream sessions by kind and outcome",
            stream_sessions.clone(),
        );

        let active_streams: Gauge = Gauge::default();
        registry.register(
            "repo_explorer_active_streams",
            "Currently open stream sessions",
            active_streams.clone(),
        );

        Self {
            cache_hits,
            cache_misses,
            upstream_api_calls,
            upstream_api_failures,
            upstream_api_rate_limit_remaining,
            fallback_resolutions,
            stream_sessions,
            active_streams,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in [`AppState`].
///
/// [`AppState`]: crate::AppState
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all metrics.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_families() {
        let registry = MetricsRegistry::new();
        registry
            .metrics
            .cache_hits
            .get_or_create(&CacheLabels {
                kind: CacheKind::Tree,
            })
            .inc();
        let text = registry.encode().unwrap();
        assert!(text.contains("repo_explorer_cache_hits_total{kind=\"Tree\"} 1"));
        assert!(text.contains("repo_explorer_active_streams"));
    }
}
