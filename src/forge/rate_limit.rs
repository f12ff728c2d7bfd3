//! Upstream API rate-limit tracking.
//!
//! Reads `X-RateLimit-Remaining` / `X-RateLimit-Reset` (or the standardised
//! `RateLimit-Remaining` / `RateLimit-Reset`) from forge API responses.  The
//! shared state feeds the `Retry-After` header of rate-limited responses and
//! the remaining-quota gauge; the per-response snapshot decides whether a 403
//! is a quota rejection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::header::HeaderMap;

/// Quota headers of a single response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub remaining: Option<u64>,
    /// Unix timestamp at which the window resets.
    pub reset_at: Option<u64>,
}

impl RateLimitSnapshot {
    /// Accepts both `X-RateLimit-*` (GitHub/Gitea) and `RateLimit-*`
    /// (IETF draft) header names.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_u64(headers, "X-RateLimit-Remaining", "RateLimit-Remaining"),
            reset_at: header_u64(headers, "X-RateLimit-Reset", "RateLimit-Reset"),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn header_u64(headers: &HeaderMap, name: &str, fallback: &str) -> Option<u64> {
    headers
        .get(name)
        .or_else(|| headers.get(fallback))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Shared rate-limit state updated after every forge API response.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    /// Remaining API calls before the rate limit resets.
    remaining: Arc<AtomicU64>,
    /// Unix timestamp at which the rate limit window resets.
    reset_at: Arc<AtomicU64>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitState {
    pub fn new() -> Self {
        Self {
            remaining: Arc::new(AtomicU64::new(u64::MAX)),
            reset_at: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current remaining calls, `u64::MAX` until a response reported it.
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Relaxed)
    }

    /// Unix timestamp when the window resets.
    pub fn reset_at(&self) -> u64 {
        self.reset_at.load(Ordering::Relaxed)
    }

    /// Update state from HTTP response headers and return what was read.
    pub fn update_from_headers(&self, headers: &HeaderMap) -> RateLimitSnapshot {
        let snapshot = RateLimitSnapshot::from_headers(headers);
        if let Some(r) = snapshot.remaining {
            self.remaining.store(r, Ordering::Relaxed);
        }
        if let Some(r) = snapshot.reset_at {
            self.reset_at.store(r, Ordering::Relaxed);
        }
        snapshot
    }
}

/// Seconds from now until `reset_at`, saturating at zero.
pub fn seconds_until(reset_at: u64) -> u64 {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    reset_at.saturating_sub(now)
}

/// Render an upstream reset timestamp for humans, e.g. `2026-10-16 14:05:00 UTC`.
pub fn format_reset(reset_at: u64) -> String {
    i64::try_from(reset_at)
        .ok()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("unix time {reset_at}"))
}
