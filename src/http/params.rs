//! Query parameters and their validation.
//!
//! Everything here runs before any upstream call is made.

use serde::Deserialize;

use crate::explorer::ExplorerError;
use crate::model::{FileRequest, TreeRequest};

pub const REPO_REQUIRED: &str = "owner and repo required";
pub const FILE_REQUIRED: &str = "owner, repo, and file path required";

/// `?owner=&repo=&ref=` (`branch=` is accepted for older clients).
#[derive(Debug, Default, Deserialize)]
pub struct TreeParams {
    pub owner: Option<String>,
    pub repo: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub branch: Option<String>,
}

impl TreeParams {
    pub fn into_request(self) -> Result<TreeRequest, ExplorerError> {
        let (owner, repo) = repo_coordinates(self.owner, self.repo, REPO_REQUIRED)?;
        Ok(TreeRequest {
            owner,
            repo,
            git_ref: present(self.git_ref).or_else(|| present(self.branch)),
        })
    }
}

/// `?owner=&repo=&path=&ref=`
#[derive(Debug, Default, Deserialize)]
pub struct FileParams {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub branch: Option<String>,
}

impl FileParams {
    pub fn into_request(self) -> Result<FileRequest, ExplorerError> {
        let (owner, repo) = repo_coordinates(self.owner, self.repo, FILE_REQUIRED)?;
        let path = present(self.path)
            .ok_or_else(|| ExplorerError::Validation(FILE_REQUIRED.to_string()))?;
        validate_file_path(&path)?;
        Ok(FileRequest {
            owner,
            repo,
            path,
            git_ref: present(self.git_ref).or_else(|| present(self.branch)),
        })
    }
}

fn repo_coordinates(
    owner: Option<String>,
    repo: Option<String>,
    missing: &str,
) -> Result<(String, String), ExplorerError> {
    let (Some(owner), Some(repo)) = (present(owner), present(repo)) else {
        return Err(ExplorerError::Validation(missing.to_string()));
    };
    validate_path_segment(&owner, "owner")?;
    validate_path_segment(&repo, "repo")?;
    Ok((owner, repo))
}

/// Empty strings count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate that a single URL path segment (owner or repo) is safe.
///
/// Rejects empty values, path separators, null bytes and `..` traversal.
pub(crate) fn validate_path_segment(segment: &str, label: &str) -> Result<(), ExplorerError> {
    if segment.is_empty() {
        return Err(ExplorerError::Validation(format!("{label} must not be empty")));
    }
    if segment.contains('/') || segment.contains('\\') || segment.contains('\0') || segment == ".."
    {
        return Err(ExplorerError::Validation(format!("invalid {label}: {segment:?}")));
    }
    Ok(())
}

/// Validate a repository-relative file path.
pub(crate) fn validate_file_path(path: &str) -> Result<(), ExplorerError> {
    if path.starts_with('/')
        || path.contains('\0')
        || path.split(['/', '\\']).any(|segment| segment == "..")
    {
        return Err(ExplorerError::Validation(format!("invalid path: {path:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_params(owner: &str, repo: &str) -> TreeParams {
        TreeParams {
            owner: Some(owner.to_string()),
            repo: Some(repo.to_string()),
            ..TreeParams::default()
        }
    }

    #[test]
    fn validate_path_segment_rejects_empty() {
        assert!(validate_path_segment("", "owner").is_err());
    }

    #[test]
    fn validate_path_segment_rejects_traversal_and_separators() {
        assert!(validate_path_segment("..", "owner").is_err());
        assert!(validate_path_segment("foo/bar", "owner").is_err());
        assert!(validate_path_segment("foo\\bar", "owner").is_err());
        assert!(validate_path_segment("foo\0bar", "owner").is_err());
    }

    #[test]
    fn validate_path_segment_accepts_normal_names() {
        assert!(validate_path_segment("acme-corp", "owner").is_ok());
        assert!(validate_path_segment("my_repo.v2", "repo").is_ok());
        assert!(validate_path_segment(".github", "repo").is_ok());
    }

    #[test]
    fn file_paths_may_nest_but_not_escape() {
        assert!(validate_file_path("src/main.rs").is_ok());
        assert!(validate_file_path("docs/..hidden/a.md").is_ok());
        assert!(validate_file_path("/etc/passwd").is_err());
        assert!(validate_file_path("src/../../secret").is_err());
        assert!(validate_file_path("..").is_err());
    }

    #[test]
    fn missing_owner_or_repo_is_rejected() {
        let err = TreeParams {
            owner: Some("octo".to_string()),
            ..TreeParams::default()
        }
        .into_request()
        .unwrap_err();
        assert_eq!(err, ExplorerError::Validation(REPO_REQUIRED.to_string()));

        let err = tree_params("", "hello").into_request().unwrap_err();
        assert_eq!(err, ExplorerError::Validation(REPO_REQUIRED.to_string()));
    }

    #[test]
    fn empty_ref_is_absent_and_branch_is_an_alias() {
        let req = TreeParams {
            git_ref: Some(String::new()),
            ..tree_params("octo", "hello")
        }
        .into_request()
        .unwrap();
        assert_eq!(req.git_ref, None);

        let req = TreeParams {
            branch: Some("dev".to_string()),
            ..tree_params("octo", "hello")
        }
        .into_request()
        .unwrap();
        assert_eq!(req.git_ref.as_deref(), Some("dev"));

        let req = TreeParams {
            git_ref: Some("v1".to_string()),
            branch: Some("dev".to_string()),
            ..tree_params("octo", "hello")
        }
        .into_request()
        .unwrap();
        assert_eq!(req.git_ref.as_deref(), Some("v1"));
    }

    #[test]
    fn file_request_requires_path() {
        let err = FileParams {
            owner: Some("octo".to_string()),
            repo: Some("hello".to_string()),
            ..FileParams::default()
        }
        .into_request()
        .unwrap_err();
        assert_eq!(err, ExplorerError::Validation(FILE_REQUIRED.to_string()));
    }
}
