//! Main axum router and single-shot request handlers.
//!
//! Routes:
//! - `GET /api/status`       - Liveness + server time
//! - `GET /api/docs`         - API usage notes rendered as HTML
//! - `GET /api/tree`         - Whole tree as one JSON body
//! - `GET /api/tree/stream`  - Tree as a chunked event stream
//! - `GET /api/file`         - Decoded file as one JSON body
//! - `GET /api/file/stream`  - File as an event stream
//! - `GET /api/download`     - Decoded file bytes as an attachment
//! - `GET /healthz`          - Health check
//! - `GET /metrics`          - Prometheus metrics

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pulldown_cmark::{html, Parser};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, instrument};

use super::error::AppError;
use super::params::{FileParams, TreeParams};
use crate::model::TreeEntry;
use crate::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(crate::health::status_handler))
        .route("/api/docs", get(handle_docs))
        // Repository browsing
        .route("/api/tree", get(handle_tree))
        .route("/api/tree/stream", get(super::stream::handle_tree_stream))
        .route("/api/file", get(handle_file))
        .route("/api/file/stream", get(super::stream::handle_file_stream))
        .route("/api/download", get(handle_download))
        // Health, metrics
        .route("/healthz", get(crate::health::health_handler))
        .route("/metrics", get(handle_metrics))
        // Browser clients are served from other origins.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TreeBody<'a> {
    tree: &'a [TreeEntry],
}

/// `GET /api/tree?owner=&repo=&ref=`
#[instrument(skip_all)]
pub(crate) async fn handle_tree(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TreeParams>,
) -> Result<Response, AppError> {
    let req = params.into_request()?;
    // Nothing to cancel: axum drops this future if the client goes away.
    let tree = state
        .explorer
        .resolve_tree(&req, &CancellationToken::new())
        .await?;
    info!(
        owner = %tree.owner,
        repo = %tree.repo,
        git_ref = %tree.git_ref,
        entries = tree.len(),
        "served tree"
    );
    Ok(Json(TreeBody {
        tree: &tree.entries,
    })
    .into_response())
}

/// `GET /api/file?owner=&repo=&path=&ref=`
#[instrument(skip_all)]
pub(crate) async fn handle_file(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FileParams>,
) -> Result<Response, AppError> {
    let req = params.into_request()?;
    let file = state.explorer.fetch_file(&req).await?;
    Ok(Json(&*file).into_response())
}

/// `GET /api/download?owner=&repo=&path=&ref=`
///
/// Same lookup as `/api/file`, but the decoded bytes are the body.
#[instrument(skip_all)]
pub(crate) async fn handle_download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FileParams>,
) -> Result<Response, AppError> {
    let req = params.into_request()?;
    let file = state.explorer.fetch_file(&req).await?;

    let mut response = Response::new(Body::from(file.bytes.clone()));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(file.file_name()),
    );
    Ok(response)
}

/// `GET /metrics`
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let buf = state
        .metrics
        .encode()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("metrics encoding failed: {e}")))?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buf,
    )
        .into_response())
}

/// `GET /api/docs`
async fn handle_docs() -> Html<String> {
    Html(render_docs(API_DOCS))
}

fn render_docs(markdown: &str) -> String {
    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, Parser::new(markdown));
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>API Docs</title></head>\n\
         <body>\n{body}</body>\n</html>\n"
    )
}

const API_DOCS: &str = "\
# Repo Explorer API

`GET /api/status`
Service status and server time.

`GET /api/tree?owner={owner}&repo={repo}&ref={ref}`
Full recursive tree of a repository as `{\"tree\": [...]}`. `ref` defaults
to the repository's default branch; `branch` is accepted as an alias.

`GET /api/tree/stream?owner={owner}&repo={repo}&ref={ref}`
The same tree as server-sent events: `progress`, `chunk`, then `done` or
`sse-error`.

`GET /api/file?owner={owner}&repo={repo}&path={path}&ref={ref}`
Decoded file as `{\"path\", \"content\", \"size\"}`.

`GET /api/file/stream?owner={owner}&repo={repo}&path={path}&ref={ref}`
The same file as server-sent events: two `progress` events, then `done`
or `sse-error`.

`GET /api/download?owner={owner}&repo={repo}&path={path}&ref={ref}`
Decoded file bytes as an attachment.
";

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `attachment; filename="<name>"`, with quoting characters replaced.
fn content_disposition(file_name: &str) -> HeaderValue {
    let name: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
