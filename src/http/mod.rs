//! HTTP layer for the repository explorer.
//!
//! Serves single-shot JSON reads, raw downloads and the two event-stream
//! endpoints, all backed by the same [`Explorer`](crate::explorer::Explorer).

pub mod error;
pub mod handler;
pub mod params;
pub mod stream;

#[cfg(test)]
pub(crate) fn test_state(
    upstream: std::sync::Arc<crate::forge::fake::FakeUpstream>,
) -> std::sync::Arc<crate::AppState> {
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cache::ResultCache;
    use crate::config::Config;
    use crate::explorer::Explorer;
    use crate::forge::rate_limit::RateLimitState;
    use crate::metrics::MetricsRegistry;

    let metrics = MetricsRegistry::new();
    let explorer = Explorer::new(
        upstream,
        ResultCache::new(NonZeroUsize::new(64).unwrap(), Duration::from_secs(300)),
        metrics.clone(),
    );
    Arc::new(crate::AppState {
        config: Arc::new(Config::default()),
        explorer,
        metrics,
        rate_limit: RateLimitState::new(),
        http_client: reqwest::Client::new(),
    })
}
