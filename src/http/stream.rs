//! Event-stream endpoints.
//!
//! Each request gets its own [`Session`] and a spawned task that drives the
//! streamer; the response body is the receiving end of the session channel.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;
use tracing::{debug, instrument, warn};

use super::error::AppError;
use super::params::{FileParams, TreeParams};
use crate::explorer::ExplorerError;
use crate::metrics::{CacheKind, MetricsRegistry, StreamLabels};
use crate::stream::{stream_file, stream_tree, ErrorEvent, Session, SseEvent, StreamOutcome};
use crate::AppState;

/// `GET /api/tree/stream?owner=&repo=&ref=`
#[instrument(skip_all)]
pub(crate) async fn handle_tree_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TreeParams>,
) -> Response {
    let req = match params.into_request() {
        Ok(req) => req,
        Err(err) => return rejected(&err),
    };

    let (session, rx) = Session::channel();
    let explorer = state.explorer.clone();
    let config = state.config.stream.clone();
    tokio::spawn(tracked(state.metrics.clone(), CacheKind::Tree, async move {
        stream_tree(&explorer, req, &config, session).await
    }));
    event_stream(body_from_channel(rx))
}

/// `GET /api/file/stream?owner=&repo=&path=&ref=`
#[instrument(skip_all)]
pub(crate) async fn handle_file_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FileParams>,
) -> Response {
    let req = match params.into_request() {
        Ok(req) => req,
        Err(err) => return rejected(&err),
    };

    let (session, rx) = Session::channel();
    let explorer = state.explorer.clone();
    tokio::spawn(tracked(state.metrics.clone(), CacheKind::File, async move {
        stream_file(&explorer, req, session).await
    }));
    event_stream(body_from_channel(rx))
}

/// Run one session while keeping the stream gauges and counters current.
async fn tracked<F>(metrics: MetricsRegistry, kind: CacheKind, session: F)
where
    F: Future<Output = StreamOutcome>,
{
    metrics.metrics.active_streams.inc();
    let outcome = session.await;
    metrics.metrics.active_streams.dec();
    debug!(?kind, ?outcome, "stream session ended");
    metrics
        .metrics
        .stream_sessions
        .get_or_create(&StreamLabels { kind, outcome })
        .inc();
}

/// A stream that consists of a single `sse-error` event.
fn rejected(err: &ExplorerError) -> Response {
    warn!(error = %err, "rejecting stream request");
    match ErrorEvent::from(err).to_frame() {
        Ok(frame) => event_stream(Body::from(frame)),
        Err(e) => AppError::Internal(e.into()).into_response(),
    }
}

fn body_from_channel(rx: mpsc::Receiver<Bytes>) -> Body {
    Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>))
}

fn event_stream(body: Body) -> Response {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    // Keeps reverse proxies from buffering the whole stream.
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::forge::fake::{flat_tree, FakeUpstream};
    use crate::http::test_state;
    use crate::stream::testing::{parse, Frame};

    async fn frames(response: Response) -> Vec<Frame> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        text.split_inclusive("\n\n")
            .map(|frame| parse(frame.as_bytes()))
            .collect()
    }

    fn tree_params() -> TreeParams {
        TreeParams {
            owner: Some("octo".to_string()),
            repo: Some("hello".to_string()),
            git_ref: None,
            branch: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tree_stream_delivers_framed_events() {
        let fake = Arc::new(FakeUpstream::new().with_tree("HEAD", Ok(flat_tree(130))));
        let state = test_state(fake);

        let response = handle_tree_stream(State(Arc::clone(&state)), Query(tree_params())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let frames = frames(response).await;
        assert_eq!(frames.first().unwrap().name, "progress");
        assert_eq!(frames.iter().filter(|f| f.name == "chunk").count(), 12);
        assert_eq!(frames.last().unwrap().name, "done");
    }

    #[tokio::test]
    async fn invalid_stream_request_is_a_single_error_event() {
        let fake = Arc::new(FakeUpstream::new());
        let state = test_state(Arc::clone(&fake));

        let params = TreeParams {
            repo: None,
            ..tree_params()
        };
        let response = handle_tree_stream(State(state), Query(params)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let frames = frames(response).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, "sse-error");
        assert_eq!(frames[0].data["message"], "owner and repo required");
        assert_eq!(frames[0].data["status"], 400);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn file_stream_without_path_is_rejected() {
        let fake = Arc::new(FakeUpstream::new());
        let state = test_state(fake);

        let params = FileParams {
            owner: Some("octo".to_string()),
            repo: Some("hello".to_string()),
            ..FileParams::default()
        };
        let response = handle_file_stream(State(state), Query(params)).await;
        let frames = frames(response).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].data["message"],
            "owner, repo, and file path required"
        );
    }

    #[tokio::test]
    async fn finished_sessions_are_counted() {
        let metrics = MetricsRegistry::new();
        tracked(metrics.clone(), CacheKind::File, async { StreamOutcome::Error }).await;

        let labels = StreamLabels {
            kind: CacheKind::File,
            outcome: StreamOutcome::Error,
        };
        assert_eq!(metrics.metrics.stream_sessions.get_or_create(&labels).get(), 1);
        assert_eq!(metrics.metrics.active_streams.get(), 0);
    }
}
