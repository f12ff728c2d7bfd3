use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::explorer::ExplorerError;
use crate::forge::rate_limit::seconds_until;

/// Application-level error type that maps cleanly to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// A resolution failure; carries its own status and client-safe message.
    Explorer(ExplorerError),
    /// An unexpected internal error.
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Explorer(err) => {
                let status = err.status();
                let body = Json(ErrorBody {
                    error: err.message(),
                });
                match err.rate_limit_reset() {
                    Some(reset_at) => {
                        let retry_after = seconds_until(reset_at);
                        warn!(retry_after, "upstream rate limit reached");
                        (
                            status,
                            [(header::RETRY_AFTER, retry_after.to_string())],
                            body,
                        )
                            .into_response()
                    }
                    None => (status, body).into_response(),
                }
            }
            AppError::Internal(err) => {
                error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<ExplorerError> for AppError {
    fn from(err: ExplorerError) -> Self {
        AppError::Explorer(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}
