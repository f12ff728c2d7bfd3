//! Classification of upstream API failures.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use super::rate_limit::{format_reset, RateLimitSnapshot};

/// A failed upstream call, classified by how callers should react to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// 422: the ref exists but is not directly addressable as a tree.
    #[error("{message}")]
    Unprocessable { message: String },
    /// Any other 4xx.  Never retried.
    #[error("{message}")]
    Client { status: u16, message: String },
    /// 403/429 with an exhausted quota.
    #[error("upstream API rate limit exceeded; resets at {}", format_reset(*.reset_at))]
    RateLimited { reset_at: u64 },
    /// 5xx from upstream.
    #[error("upstream server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// Timeout or connection failure before a response arrived.
    #[error("{message}")]
    Transient { message: String, timed_out: bool },
    /// A response arrived but did not have the expected shape.
    #[error("unexpected response from upstream: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Classify a non-success response.
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let code = status.as_u16();
        let limits = RateLimitSnapshot::from_headers(headers);

        if matches!(code, 403 | 429) && limits.is_exhausted() {
            let reset_at = limits
                .reset_at
                .unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64);
            return Self::RateLimited { reset_at };
        }

        let message = upstream_message(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("upstream returned HTTP {code}"))
        });

        match code {
            422 => Self::Unprocessable { message },
            400..=499 => Self::Client {
                status: code,
                message,
            },
            _ => Self::Server {
                status: code,
                message,
            },
        }
    }

    /// Classify a transport-level failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        let timed_out = err.is_timeout();
        let message = if timed_out {
            "upstream request timed out".to_string()
        } else {
            format!("upstream request failed: {err}")
        };
        Self::Transient { message, timed_out }
    }

    /// Whether this failure permits the branch-commit fallback.
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, Self::Unprocessable { .. })
    }

    /// HTTP status surfaced to clients.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Client { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            Self::RateLimited { .. } => StatusCode::FORBIDDEN,
            Self::Transient {
                timed_out: true, ..
            } => StatusCode::GATEWAY_TIMEOUT,
            Self::Server { .. } | Self::Transient { .. } | Self::Decode(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Message surfaced to clients.  Decode details stay in the logs.
    pub fn message(&self) -> String {
        match self {
            Self::Decode(_) => "unexpected response from upstream".to_string(),
            other => other.to_string(),
        }
    }

    /// Short label for metrics.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Unprocessable { .. } => "unprocessable",
            Self::Client { .. } => "client",
            Self::RateLimited { .. } => "rate_limited",
            Self::Server { .. } => "server",
            Self::Transient { .. } => "transient",
            Self::Decode(_) => "decode",
        }
    }
}

/// GitHub error bodies look like `{"message": "...", "documentation_url": "..."}`.
fn upstream_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
