//! Core data model shared by the resolver, the cache and the streamers.

use bytes::Bytes;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Kind of a tree entry.  Serialised with the upstream git object names so
/// that browsing clients can consume either the upstream listing or ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    #[serde(rename = "blob")]
    File,
    #[serde(rename = "tree")]
    Directory,
}

impl EntryKind {
    /// Map an upstream git object type.  Anything other than a blob or a tree
    /// (submodule `commit` links) has no place in the browsable tree.
    pub fn from_git_type(kind: &str) -> Option<Self> {
        match kind {
            "blob" => Some(Self::File),
            "tree" => Some(Self::Directory),
            _ => None,
        }
    }
}

/// One file or directory in a resolved tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(rename = "sha")]
    pub identity: String,
    pub size: u64,
}

/// The compact view of an entry carried by `chunk` events.
#[derive(Debug, Serialize)]
pub struct ChunkItem<'a> {
    pub path: &'a str,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
}

impl<'a> From<&'a TreeEntry> for ChunkItem<'a> {
    fn from(entry: &'a TreeEntry) -> Self {
        Self {
            path: &entry.path,
            kind: entry.kind,
            size: entry.size,
        }
    }
}

/// A flattened, immutable listing of a repository at one ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub owner: String,
    pub repo: String,
    /// The ref as requested, `HEAD` when none was given.
    pub git_ref: String,
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Decoded contents of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    pub path: String,
    /// Decoded bytes rendered as text (lossy for non-UTF-8 content).
    pub content: String,
    /// Size of the decoded bytes.
    pub size: u64,
    /// Decoded bytes, kept for the attachment download.
    #[serde(skip)]
    pub bytes: Bytes,
}

impl FileContent {
    pub fn from_bytes(path: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            path: path.into(),
            content: String::from_utf8_lossy(&bytes).into_owned(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// Final path segment, used as the download filename.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Token substituted for an absent ref in cache keys and tree lookups.
pub const HEAD: &str = "HEAD";

/// Branch consulted by the fallback resolution when no ref was given.
pub const DEFAULT_BRANCH: &str = "main";

/// A validated tree lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRequest {
    pub owner: String,
    pub repo: String,
    pub git_ref: Option<String>,
}

impl TreeRequest {
    /// The ref as used for cache keys and the first tree lookup.
    pub fn ref_or_head(&self) -> &str {
        self.git_ref.as_deref().unwrap_or(HEAD)
    }

    /// The branch consulted by the fallback resolution.
    pub fn fallback_branch(&self) -> &str {
        self.git_ref.as_deref().unwrap_or(DEFAULT_BRANCH)
    }
}

/// A validated file lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub git_ref: Option<String>,
}

impl FileRequest {
    pub fn ref_or_head(&self) -> &str {
        self.git_ref.as_deref().unwrap_or(HEAD)
    }
}
