use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::config::StreamConfig;
use crate::explorer::{Explorer, ExplorerError};
use crate::model::{ChunkItem, TreeRequest};

use super::event::{ErrorEvent, TreeEvent};
use super::{chunk_size, percent_sent, Session, StreamOutcome, INITIAL_PERCENT};

/// Resolve a tree and deliver it to `session` in bounded chunks.
///
/// Chunks preserve tree order, every entry appears in exactly one chunk and
/// each chunk is preceded by a progress event.  `done` repeats the full
/// entry list for clients that ignore chunks.
#[instrument(skip_all, fields(owner = %req.owner, repo = %req.repo, git_ref = %req.ref_or_head()))]
pub async fn stream_tree(
    explorer: &Explorer,
    req: TreeRequest,
    config: &StreamConfig,
    mut session: Session,
) -> StreamOutcome {
    let percent = session.advance(INITIAL_PERCENT);
    let started = TreeEvent::Progress {
        percent,
        message: "Resolving repository tree".to_string(),
        count: None,
        total: None,
    };
    if !session.emit(&started).await {
        return StreamOutcome::Disconnected;
    }

    let tree = match explorer.resolve_tree(&req, session.cancellation()).await {
        Ok(tree) => tree,
        Err(ExplorerError::Cancelled) => return StreamOutcome::Disconnected,
        Err(err) => {
            warn!(error = %err, "tree stream failed");
            let event = TreeEvent::Error(ErrorEvent::from(&err));
            return if session.finish(&event).await {
                StreamOutcome::Error
            } else {
                StreamOutcome::Disconnected
            };
        }
    };

    let total = tree.len();
    let size = chunk_size(total, config.chunk_fan_out, config.chunk_floor);
    let pause = config.chunk_pause();
    debug!(total, chunk_size = size, "streaming tree");

    let mut sent = 0;
    for (index, chunk) in tree.entries.chunks(size).enumerate() {
        if index > 0 {
            pace(pause).await;
        }
        sent += chunk.len();

        let percent = session.advance(percent_sent(sent, total));
        let progress = TreeEvent::Progress {
            percent,
            message: format!("Sent {sent} of {total} entries"),
            count: Some(sent),
            total: Some(total),
        };
        if !session.emit(&progress).await {
            return StreamOutcome::Disconnected;
        }

        let items = TreeEvent::Chunk {
            items: chunk.iter().map(ChunkItem::from).collect(),
        };
        if !session.emit(&items).await {
            return StreamOutcome::Disconnected;
        }
    }

    if session.finish(&TreeEvent::Done { tree: &tree.entries }).await {
        StreamOutcome::Done
    } else {
        StreamOutcome::Disconnected
    }
}

async fn pace(pause: Duration) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}
