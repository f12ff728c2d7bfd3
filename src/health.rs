use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::cache::ResultCache;
use crate::forge::rate_limit::{format_reset, RateLimitState};
use crate::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub upstream: CheckResult,
    pub quota: CheckResult,
    pub cache: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

async fn check_upstream(client: &reqwest::Client, api_url: &str) -> CheckResult {
    // `/rate_limit` does not count against the quota.
    let url = format!("{}/rate_limit", api_url.trim_end_matches('/'));
    match client.head(&url).send().await {
        Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
            CheckResult::healthy()
        }
        Ok(resp) => CheckResult::unhealthy(format!("HEAD {} returned {}", url, resp.status())),
        Err(e) => CheckResult::unhealthy(format!("HEAD {} failed: {e}", url)),
    }
}

fn check_quota(rate_limit: &RateLimitState) -> CheckResult {
    match rate_limit.remaining() {
        u64::MAX => CheckResult::healthy(),
        0 => CheckResult::unhealthy(format!(
            "quota exhausted, resets at {}",
            format_reset(rate_limit.reset_at())
        )),
        remaining => CheckResult {
            ok: true,
            detail: Some(format!("{remaining} calls remaining")),
        },
    }
}

fn check_cache(cache: &ResultCache) -> CheckResult {
    CheckResult {
        ok: true,
        detail: Some(format!("{} / {} entries", cache.len(), cache.capacity())),
    }
}

// ---------------------------------------------------------------------------
// Aggregate status
// ---------------------------------------------------------------------------

fn aggregate_status(checks: &HealthChecks) -> HealthStatus {
    // Cached results keep being served while upstream is unavailable.
    if checks.upstream.ok && checks.quota.ok && checks.cache.ok {
        HealthStatus::Ok
    } else {
        HealthStatus::Degraded
    }
}

// ---------------------------------------------------------------------------
// Axum handlers
// ---------------------------------------------------------------------------

/// `GET /api/status`
pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        message: "API is running",
        time: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /healthz` handler.  Always 200; the body says whether the service is
/// degraded.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let checks = HealthChecks {
        upstream: check_upstream(&state.http_client, &state.config.upstream.api_url).await,
        quota: check_quota(&state.rate_limit),
        cache: check_cache(state.explorer.cache()),
    };
    let status = aggregate_status(&checks);
    (StatusCode::OK, Json(HealthResponse { status, checks }))
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue};

    use super::*;

    #[tokio::test]
    async fn status_reports_running() {
        let Json(body) = status_handler().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.message, "API is running");
        assert!(chrono::DateTime::parse_from_rfc3339(&body.time).is_ok());
    }

    #[test]
    fn quota_is_healthy_until_exhausted() {
        let state = RateLimitState::new();
        assert!(check_quota(&state).ok);

        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("12"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        state.update_from_headers(&headers);
        let check = check_quota(&state);
        assert!(check.ok);
        assert_eq!(check.detail.as_deref(), Some("12 calls remaining"));

        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        state.update_from_headers(&headers);
        let check = check_quota(&state);
        assert!(!check.ok);
        assert_eq!(
            check.detail.as_deref(),
            Some("quota exhausted, resets at 2023-11-14 22:13:20 UTC")
        );
    }

    #[test]
    fn cache_check_reports_occupancy() {
        let cache = ResultCache::new(NonZeroUsize::new(10).unwrap(), Duration::from_secs(60));
        assert_eq!(check_cache(&cache).detail.as_deref(), Some("0 / 10 entries"));
    }

    #[test]
    fn any_failed_check_degrades() {
        let checks = HealthChecks {
            upstream: CheckResult::unhealthy("down"),
            quota: CheckResult::healthy(),
            cache: CheckResult::healthy(),
        };
        assert_eq!(aggregate_status(&checks), HealthStatus::Degraded);

        let checks = HealthChecks {
            upstream: CheckResult::healthy(),
            quota: CheckResult::healthy(),
            cache: CheckResult::healthy(),
        };
        assert_eq!(aggregate_status(&checks), HealthStatus::Ok);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_unhealthy() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let check = check_upstream(&client, "http://127.0.0.1:1").await;
        assert!(!check.ok);
        assert!(check.detail.unwrap().starts_with("HEAD http://127.0.0.1:1/rate_limit"));
    }
}
