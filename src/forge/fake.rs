//! Scripted in-memory [`Upstream`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    Upstream, UpstreamBranch, UpstreamCommitRef, UpstreamError, UpstreamFile, UpstreamTree,
    UpstreamTreeRecord,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Tree(String),
    Branch(String),
    File(String, Option<String>),
}

#[derive(Default)]
pub struct FakeUpstream {
    trees: Mutex<HashMap<String, Result<UpstreamTree, UpstreamError>>>,
    branches: Mutex<HashMap<String, Result<UpstreamBranch, UpstreamError>>>,
    files: Mutex<HashMap<String, Result<UpstreamFile, UpstreamError>>>,
    calls: Mutex<Vec<Call>>,
}

pub fn not_found() -> UpstreamError {
    UpstreamError::Client {
        status: 404,
        message: "Not Found".to_string(),
    }
}

pub fn unprocessable() -> UpstreamError {
    UpstreamError::Unprocessable {
        message: "No commit found for the ref".to_string(),
    }
}

/// A tree with `n` files named `file-0000` .. in order.
pub fn flat_tree(n: usize) -> UpstreamTree {
    UpstreamTree {
        truncated: false,
        tree: (0..n)
            .map(|i| UpstreamTreeRecord {
                path: format!("file-{i:04}"),
                kind: "blob".to_string(),
                sha: format!("sha-{i}"),
                size: Some(i as u64),
            })
            .collect(),
    }
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(self, tree_ish: &str, result: Result<UpstreamTree, UpstreamError>) -> Self {
        self.trees
            .lock()
            .unwrap()
            .insert(tree_ish.to_string(), result);
        self
    }

    pub fn with_branch(self, branch: &str, head: Result<&str, UpstreamError>) -> Self {
        let result = head.map(|sha| UpstreamBranch {
            name: branch.to_string(),
            commit: UpstreamCommitRef {
                sha: sha.to_string(),
            },
        });
        self.branches
            .lock()
            .unwrap()
            .insert(branch.to_string(), result);
        self
    }

    pub fn with_file(self, path: &str, result: Result<UpstreamFile, UpstreamError>) -> Self {
        self.files.lock().unwrap().insert(path.to_string(), result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tree_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Tree(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Upstream for FakeUpstream {
    async fn get_tree(
        &self,
        _owner: &str,
        _repo: &str,
        tree_ish: &str,
    ) -> Result<UpstreamTree, UpstreamError> {
        self.record(Call::Tree(tree_ish.to_string()));
        self.trees
            .lock()
            .unwrap()
            .get(tree_ish)
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn get_branch(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
    ) -> Result<UpstreamBranch, UpstreamError> {
        self.record(Call::Branch(branch.to_string()));
        self.branches
            .lock()
            .unwrap()
            .get(branch)
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn get_file(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<UpstreamFile, UpstreamError> {
        self.record(Call::File(path.to_string(), git_ref.map(str::to_string)));
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }
}
