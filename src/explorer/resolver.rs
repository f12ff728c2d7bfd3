//! Ref → tree resolution with a single branch-commit fallback.
//!
//! 1. Cache lookup under `tree:{owner}/{repo}:{ref-or-HEAD}`.
//! 2. Tree lookup by the ref as given (`HEAD` when absent).
//! 3. Only if (2) was unprocessable: resolve the branch (`main` when no ref
//!    was given) to its head commit and look the tree up by that commit.
//!    The second lookup's failure is final whatever its class.
//! 4. Normalise, cache, return.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{tree_key, CachedValue};
use crate::forge::{UpstreamError, UpstreamTree};
use crate::metrics::CacheKind;
use crate::model::{EntryKind, Tree, TreeEntry, TreeRequest};

use super::{Explorer, ExplorerError};

/// Outcome of the direct tree lookup.
enum Attempt {
    Resolved(UpstreamTree),
    RetryViaBranch(UpstreamError),
    Surface(UpstreamError),
}

impl From<Result<UpstreamTree, UpstreamError>> for Attempt {
    fn from(result: Result<UpstreamTree, UpstreamError>) -> Self {
        match result {
            Ok(tree) => Self::Resolved(tree),
            Err(err) if err.triggers_fallback() => Self::RetryViaBranch(err),
            Err(err) => Self::Surface(err),
        }
    }
}

impl Explorer {
    /// Resolve a tree, consulting the cache first.
    #[instrument(skip_all, fields(owner = %req.owner, repo = %req.repo, git_ref = %req.ref_or_head()))]
    pub async fn resolve_tree(
        &self,
        req: &TreeRequest,
        cancel: &CancellationToken,
    ) -> Result<Arc<Tree>, ExplorerError> {
        let key = tree_key(req);
        if let Some(tree) = self.cache.get_tree(&key) {
            self.record_lookup(CacheKind::Tree, true);
            debug!(%key, entries = tree.len(), "tree cache hit");
            return Ok(tree);
        }
        self.record_lookup(CacheKind::Tree, false);
        debug!(%key, "tree cache miss");

        let direct = self
            .upstream
            .get_tree(&req.owner, &req.repo, req.ref_or_head())
            .await;

        let upstream_tree = match Attempt::from(direct) {
            Attempt::Resolved(tree) => tree,
            Attempt::Surface(err) => return Err(err.into()),
            Attempt::RetryViaBranch(err) => {
                if cancel.is_cancelled() {
                    return Err(ExplorerError::Cancelled);
                }
                info!(
                    reason = %err,
                    branch = req.fallback_branch(),
                    "tree lookup unprocessable, retrying via branch head commit"
                );
                self.metrics.metrics.fallback_resolutions.inc();
                self.resolve_via_branch(req, cancel).await?
            }
        };

        let tree = Arc::new(normalize_tree(req, upstream_tree));
        self.cache.put(key, CachedValue::Tree(Arc::clone(&tree)));
        Ok(tree)
    }

    async fn resolve_via_branch(
        &self,
        req: &TreeRequest,
        cancel: &CancellationToken,
    ) -> Result<UpstreamTree, ExplorerError> {
        let branch_name = req.fallback_branch();
        let exhausted = |source| ExplorerError::FallbackExhausted {
            git_ref: branch_name.to_string(),
            source,
        };

        let branch = self
            .upstream
            .get_branch(&req.owner, &req.repo, branch_name)
            .await
            .map_err(exhausted)?;

        if cancel.is_cancelled() {
            return Err(ExplorerError::Cancelled);
        }

        debug!(branch = %branch.name, commit = %branch.commit.sha, "resolved branch head");
        self.upstream
            .get_tree(&req.owner, &req.repo, &branch.commit.sha)
            .await
            .map_err(exhausted)
    }
}

/// Map upstream records onto [`TreeEntry`], keeping upstream order.
pub fn normalize_tree(req: &TreeRequest, upstream: UpstreamTree) -> Tree {
    if upstream.truncated {
        warn!(
            owner = %req.owner,
            repo = %req.repo,
            records = upstream.tree.len(),
            "upstream tree listing is truncated"
        );
    }

    let entries = upstream
        .tree
        .into_iter()
        .filter(|record| !record.path.is_empty())
        .filter_map(|record| {
            let kind = EntryKind::from_git_type(&record.kind)?;
            let size = match kind {
                EntryKind::File => record.size.unwrap_or(0),
                EntryKind::Directory => 0,
            };
            Some(TreeEntry {
                path: record.path,
                kind,
                identity: record.sha,
                size,
            })
        })
        .collect();

    Tree {
        owner: req.owner.clone(),
        repo: req.repo.clone(),
        git_ref: req.ref_or_head().to_string(),
        entries,
    }
}
