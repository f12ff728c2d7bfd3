use tracing::{instrument, warn};

use crate::explorer::{Explorer, ExplorerError};
use crate::model::FileRequest;

use super::event::{ErrorEvent, FileEvent};
use super::{Session, StreamOutcome, FETCHED_PERCENT, INITIAL_PERCENT};

/// Fetch, decode and deliver one file to `session`.
///
/// Emits progress at 5% before the lookup and at 50% once the payload is in
/// hand, cache hit or not, then a single terminal event.
#[instrument(skip_all, fields(owner = %req.owner, repo = %req.repo, path = %req.path))]
pub async fn stream_file(explorer: &Explorer, req: FileRequest, mut session: Session) -> StreamOutcome {
    let percent = session.advance(INITIAL_PERCENT);
    let started = FileEvent::Progress {
        percent,
        message: format!("Fetching {}", req.path),
        size: None,
    };
    if !session.emit(&started).await {
        return StreamOutcome::Disconnected;
    }

    let result = match explorer.cached_file(&req) {
        Some(file) => {
            let percent = session.advance(FETCHED_PERCENT);
            let loaded = FileEvent::Progress {
                percent,
                message: "Loaded from cache".to_string(),
                size: Some(file.size),
            };
            if !session.emit(&loaded).await {
                return StreamOutcome::Disconnected;
            }
            Ok(file)
        }
        None => match explorer.fetch_raw_file(&req).await {
            Ok(raw) => {
                let percent = session.advance(FETCHED_PERCENT);
                let fetched = FileEvent::Progress {
                    percent,
                    message: "Decoding file".to_string(),
                    size: Some(raw.size),
                };
                if !session.emit(&fetched).await {
                    return StreamOutcome::Disconnected;
                }
                explorer.store_file(&req, raw)
            }
            Err(err) => Err(err),
        },
    };

    match result {
        Ok(file) => {
            if session.finish(&FileEvent::Done { file: &file }).await {
                StreamOutcome::Done
            } else {
                StreamOutcome::Disconnected
            }
        }
        Err(ExplorerError::Cancelled) => StreamOutcome::Disconnected,
        Err(err) => {
            warn!(error = %err, "file stream failed");
            if session.finish(&FileEvent::Error(ErrorEvent::from(&err))).await {
                StreamOutcome::Error
            } else {
                StreamOutcome::Disconnected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::time::Duration;

    use base64::Engine as _;

    use super::*;
    use crate::cache::ResultCache;
    use crate::forge::fake::{not_found, Call, FakeUpstream};
    use crate::forge::UpstreamFile;
    use crate::metrics::MetricsRegistry;
    use crate::stream::testing::{collect, Frame};

    fn explorer(fake: Arc<FakeUpstream>) -> Explorer {
        Explorer::new(
            fake,
            ResultCache::new(NonZeroUsize::new(8).unwrap(), Duration::from_secs(300)),
            MetricsRegistry::new(),
        )
    }

    fn request(path: &str) -> FileRequest {
        FileRequest {
            owner: "octo".to_string(),
            repo: "hello".to_string(),
            path: path.to_string(),
            git_ref: None,
        }
    }

    fn readme() -> UpstreamFile {
        UpstreamFile {
            path: "README.md".to_string(),
            content: base64::engine::general_purpose::STANDARD.encode("# hello\nworld\n"),
            encoding: Some("base64".to_string()),
            size: 14,
        }
    }

    async fn run(explorer: &Explorer, req: FileRequest) -> (StreamOutcome, Vec<Frame>) {
        let (session, rx) = Session::channel();
        let reader = tokio::spawn(collect(rx));
        let outcome = stream_file(explorer, req, session).await;
        (outcome, reader.await.unwrap())
    }

    #[tokio::test]
    async fn progress_then_decoded_file() {
        let fake = Arc::new(FakeUpstream::new().with_file("README.md", Ok(readme())));
        let explorer = explorer(fake);

        let (outcome, frames) = run(&explorer, request("README.md")).await;
        assert_eq!(outcome, StreamOutcome::Done);

        let names: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["progress", "progress", "done"]);
        assert_eq!(frames[0].data["percent"], 5);
        assert_eq!(frames[1].data["percent"], 50);
        assert_eq!(frames[1].data["size"], 14);
        assert_eq!(frames[2].data["file"]["content"], "# hello\nworld\n");
        assert_eq!(frames[2].data["file"]["path"], "README.md");
    }

    #[tokio::test]
    async fn cache_hit_keeps_the_same_event_shape() {
        let fake = Arc::new(FakeUpstream::new().with_file("README.md", Ok(readme())));
        let explorer = explorer(Arc::clone(&fake));

        run(&explorer, request("README.md")).await;
        let (outcome, frames) = run(&explorer, request("README.md")).await;

        assert_eq!(outcome, StreamOutcome::Done);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].data["percent"], 50);
        assert_eq!(
            fake.calls(),
            vec![Call::File("README.md".to_string(), None)]
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_single_error() {
        let fake = Arc::new(FakeUpstream::new().with_file("nope.txt", Err(not_found())));
        let explorer = explorer(fake);

        let (outcome, frames) = run(&explorer, request("nope.txt")).await;
        assert_eq!(outcome, StreamOutcome::Error);

        let names: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["progress", "sse-error"]);
        assert_eq!(frames[1].data["status"], 404);
        assert!(explorer.cache().is_empty());
    }

    #[tokio::test]
    async fn undecodable_payload_fails_after_fetch_progress() {
        let bad = UpstreamFile {
            path: "x.bin".to_string(),
            content: "%%%".to_string(),
            encoding: Some("base64".to_string()),
            size: 3,
        };
        let fake = Arc::new(FakeUpstream::new().with_file("x.bin", Ok(bad)));
        let explorer = explorer(fake);

        let (outcome, frames) = run(&explorer, request("x.bin")).await;
        assert_eq!(outcome, StreamOutcome::Error);

        let names: Vec<&str> = frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["progress", "progress", "sse-error"]);
        assert_eq!(frames[2].data["message"], "unexpected response from upstream");
    }
}
