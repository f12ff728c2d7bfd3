//! Cache-aware resolution of repository trees and files.
//!
//! [`Explorer`] is the single entry point shared by the streaming and the
//! single-shot handlers, so both surfaces use the same cache keys and the
//! same fallback rules.

pub mod decode;
pub mod error;
pub mod file;
pub mod resolver;

use std::sync::Arc;

use crate::cache::ResultCache;
use crate::forge::Upstream;
use crate::metrics::{CacheKind, CacheLabels, MetricsRegistry};

pub use error::ExplorerError;

#[derive(Clone)]
pub struct Explorer {
    upstream: Arc<dyn Upstream>,
    cache: ResultCache,
    metrics: MetricsRegistry,
}

impl Explorer {
    pub fn new(upstream: Arc<dyn Upstream>, cache: ResultCache, metrics: MetricsRegistry) -> Self {
        Self {
            upstream,
            cache,
            metrics,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    fn record_lookup(&self, kind: CacheKind, hit: bool) {
        let labels = CacheLabels { kind };
        let family = if hit {
            &self.metrics.metrics.cache_hits
        } else {
            &self.metrics.metrics.cache_misses
        };
        family.get_or_create(&labels).inc();
    }
}
