//! Typed stream events and their server-sent-event framing.
//!
//! Every frame is `event: <name>\ndata: <json>\n\n`.  JSON never contains a
//! raw newline, so one `data:` line always suffices.

use bytes::Bytes;
use serde::Serialize;

use crate::explorer::ExplorerError;
use crate::model::{ChunkItem, FileContent, TreeEntry};

/// An event that can be written to a stream session.
pub trait SseEvent: Serialize {
    fn name(&self) -> &'static str;

    fn to_frame(&self) -> Result<Bytes, serde_json::Error> {
        encode_frame(self.name(), self)
    }
}

pub fn encode_frame<T: Serialize + ?Sized>(name: &str, payload: &T) -> Result<Bytes, serde_json::Error> {
    let data = serde_json::to_string(payload)?;
    Ok(Bytes::from(format!("event: {name}\ndata: {data}\n\n")))
}

/// Payload of the terminal `sse-error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&ExplorerError> for ErrorEvent {
    fn from(err: &ExplorerError) -> Self {
        Self {
            message: err.message(),
            status: Some(err.status().as_u16()),
        }
    }
}

impl SseEvent for ErrorEvent {
    fn name(&self) -> &'static str {
        "sse-error"
    }
}

// ---------------------------------------------------------------------------
// Tree stream
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TreeEvent<'a> {
    Progress {
        percent: u8,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
    },
    Chunk {
        items: Vec<ChunkItem<'a>>,
    },
    Done {
        tree: &'a [TreeEntry],
    },
    Error(ErrorEvent),
}

impl SseEvent for TreeEvent<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Chunk { .. } => "chunk",
            Self::Done { .. } => "done",
            Self::Error(e) => e.name(),
        }
    }
}

// ---------------------------------------------------------------------------
// File stream
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FileEvent<'a> {
    Progress {
        percent: u8,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
    },
    Done {
        file: &'a FileContent,
    },
    Error(ErrorEvent),
}

impl SseEvent for FileEvent<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Done { .. } => "done",
            Self::Error(e) => e.name(),
        }
    }
}
