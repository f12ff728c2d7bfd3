//! Upstream repository API.
//!
//! Provides the [`Upstream`] trait covering the three calls the explorer
//! needs (tree by ref, branch, file contents).  Callers dispatch through the
//! trait so that no upstream URL construction or response parsing leaks
//! outside this module.

pub mod error;
#[cfg(test)]
pub mod fake;
pub mod github;
pub mod rate_limit;

use serde::Deserialize;

pub use error::UpstreamError;

// ---------------------------------------------------------------------------
// Upstream payloads
// ---------------------------------------------------------------------------

/// `GET /repos/{owner}/{repo}/git/trees/{ref}?recursive=1`
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamTree {
    #[serde(default)]
    pub truncated: bool,
    pub tree: Vec<UpstreamTreeRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamTreeRecord {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
    /// Absent for trees and submodules.
    #[serde(default)]
    pub size: Option<u64>,
}

/// `GET /repos/{owner}/{repo}/branches/{branch}`
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamBranch {
    pub name: String,
    pub commit: UpstreamCommitRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamCommitRef {
    pub sha: String,
}

/// `GET /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
    /// `base64` for regular files; `none` for files too large to inline.
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub size: u64,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over the upstream repository-hosting API.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// Fetch the fully expanded tree for a tree-ish (ref name or commit).
    async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        tree_ish: &str,
    ) -> Result<UpstreamTree, UpstreamError>;

    /// Fetch a branch and its head commit.
    async fn get_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<UpstreamBranch, UpstreamError>;

    /// Fetch a single file's (possibly encoded) contents.
    async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<UpstreamFile, UpstreamError>;
}
