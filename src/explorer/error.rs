use axum::http::StatusCode;

use crate::forge::UpstreamError;

/// Failure of a tree or file resolution, as seen by handlers and streamers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExplorerError {
    /// Missing or malformed request parameters; no upstream call was made.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    /// The direct lookup was unprocessable and the branch-commit retry failed
    /// too.  Carries the retry's failure, never the first one.
    #[error("could not resolve {git_ref}: {source}")]
    FallbackExhausted {
        git_ref: String,
        #[source]
        source: UpstreamError,
    },
    /// The client went away before the resolution could continue.
    #[error("request cancelled")]
    Cancelled,
}

impl ExplorerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(err) | Self::FallbackExhausted { source: err, .. } => err.status(),
            // nginx's "client closed request"; only ever logged.
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Upstream(err) => err.message(),
            Self::FallbackExhausted { git_ref, source } => {
                format!("could not resolve {git_ref}: {}", source.message())
            }
            other => other.to_string(),
        }
    }

    /// The `Retry-After` hint for rate-limited failures.
    pub fn rate_limit_reset(&self) -> Option<u64> {
        match self {
            Self::Upstream(UpstreamError::RateLimited { reset_at })
            | Self::FallbackExhausted {
                source: UpstreamError::RateLimited { reset_at },
                ..
            } => Some(*reset_at),
            _ => None,
        }
    }
}
