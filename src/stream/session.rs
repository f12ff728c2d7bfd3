//! Per-connection stream state.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::event::SseEvent;

/// Frames buffered between the streamer and the response body.
pub const CHANNEL_CAPACITY: usize = 4;

/// One client connection.
///
/// Events are written in call order.  Once the receiving side is gone, every
/// further write is a silent no-op and the cancellation token fires so that
/// resolution stops issuing upstream calls.
pub struct Session {
    tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    watcher: JoinHandle<()>,
    last_percent: u8,
    finished: bool,
}

impl Session {
    /// Create a session and the receiver feeding the response body.
    pub fn channel() -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }

    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let tx = tx.clone();
            let cancel = cancel.clone();
            async move {
                tx.closed().await;
                cancel.cancel();
            }
        });
        Self {
            tx,
            cancel,
            watcher,
            last_percent: 0,
            finished: false,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Clamp a progress percentage so the session never goes backwards and
    /// never reports 100 before the terminal event.
    pub fn advance(&mut self, percent: u8) -> u8 {
        self.last_percent = self.last_percent.max(percent.min(99));
        self.last_percent
    }

    /// Write one event.  Returns `false` once the client is gone or the
    /// session already ended.
    pub async fn emit<E: SseEvent>(&mut self, event: &E) -> bool {
        if self.finished || self.is_cancelled() {
            return false;
        }
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, event = event.name(), "failed to encode stream event");
                return false;
            }
        };
        if self.tx.send(frame).await.is_err() {
            debug!(event = event.name(), "client disconnected, dropping event");
            self.cancel.cancel();
            return false;
        }
        true
    }

    /// Write the terminal event.  Nothing can be written afterwards.
    pub async fn finish<E: SseEvent>(&mut self, event: &E) -> bool {
        let sent = self.emit(event).await;
        self.finished = true;
        sent
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The watcher holds a sender; it must go for the body to end.
        self.watcher.abort();
    }
}
