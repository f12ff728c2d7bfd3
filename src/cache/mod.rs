//! In-process result cache for resolved trees and decoded files.
//!
//! Keys:
//! - `tree:{owner}/{repo}:{ref-or-HEAD}`
//! - `file:{owner}/{repo}:{ref-or-HEAD}:{path}`

pub mod lru;

pub use self::lru::{CachedValue, ResultCache};

use crate::model::{FileRequest, TreeRequest};

pub fn tree_key(req: &TreeRequest) -> String {
    format!("tree:{}/{}:{}", req.owner, req.repo, req.ref_or_head())
}

pub fn file_key(req: &FileRequest) -> String {
    format!(
        "file:{}/{}:{}:{}",
        req.owner,
        req.repo,
        req.ref_or_head(),
        req.path
    )
}
