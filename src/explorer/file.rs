//! File fetch, decode and cache.
//!
//! The steps are exposed separately so the file streamer can report progress
//! between fetching and decoding.  Only decoded content is ever cached.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::cache::{file_key, CachedValue};
use crate::forge::UpstreamFile;
use crate::metrics::CacheKind;
use crate::model::{FileContent, FileRequest};

use super::decode::decode_file;
use super::{Explorer, ExplorerError};

impl Explorer {
    /// Cache lookup under `file:{owner}/{repo}:{ref-or-HEAD}:{path}`.
    pub fn cached_file(&self, req: &FileRequest) -> Option<Arc<FileContent>> {
        let key = file_key(req);
        let cached = self.cache.get_file(&key);
        self.record_lookup(CacheKind::File, cached.is_some());
        debug!(%key, hit = cached.is_some(), "file cache lookup");
        cached
    }

    /// Fetch the raw (possibly encoded) payload from upstream.
    #[instrument(skip_all, fields(owner = %req.owner, repo = %req.repo, path = %req.path))]
    pub async fn fetch_raw_file(&self, req: &FileRequest) -> Result<UpstreamFile, ExplorerError> {
        let raw = self
            .upstream
            .get_file(&req.owner, &req.repo, &req.path, req.git_ref.as_deref())
            .await?;
        Ok(raw)
    }

    /// Decode a raw payload once and cache the result.
    pub fn store_file(
        &self,
        req: &FileRequest,
        raw: UpstreamFile,
    ) -> Result<Arc<FileContent>, ExplorerError> {
        let file = Arc::new(decode_file(raw)?);
        self.cache
            .put(file_key(req), CachedValue::File(Arc::clone(&file)));
        Ok(file)
    }

    /// Cached or freshly fetched and decoded file.
    pub async fn fetch_file(&self, req: &FileRequest) -> Result<Arc<FileContent>, ExplorerError> {
        if let Some(file) = self.cached_file(req) {
            return Ok(file);
        }
        let raw = self.fetch_raw_file(req).await?;
        self.store_file(req, raw)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use base64::Engine as _;

    use super::*;
    use crate::cache::ResultCache;
    use crate::forge::fake::{not_found, Call, FakeUpstream};
    use crate::forge::UpstreamError;
    use crate::metrics::MetricsRegistry;

    fn explorer(fake: Arc<FakeUpstream>) -> Explorer {
        Explorer::new(
            fake,
            ResultCache::new(NonZeroUsize::new(8).unwrap(), Duration::from_secs(60)),
            MetricsRegistry::new(),
        )
    }

    fn request(path: &str, git_ref: Option<&str>) -> FileRequest {
        FileRequest {
            owner: "o".to_string(),
            repo: "r".to_string(),
            path: path.to_string(),
            git_ref: git_ref.map(str::to_string),
        }
    }

    fn encoded(path: &str, text: &str) -> UpstreamFile {
        UpstreamFile {
            path: path.to_string(),
            content: base64::engine::general_purpose::STANDARD.encode(text),
            encoding: Some("base64".to_string()),
            size: text.len() as u64,
        }
    }

    #[tokio::test]
    async fn fetch_decodes_and_caches() {
        let fake = Arc::new(
            FakeUpstream::new().with_file("README.md", Ok(encoded("README.md", "# hello\n"))),
        );
        let explorer = explorer(Arc::clone(&fake));
        let req = request("README.md", Some("dev"));

        let first = explorer.fetch_file(&req).await.unwrap();
        let second = explorer.fetch_file(&req).await.unwrap();

        assert_eq!(first.content, "# hello\n");
        assert_eq!(first, second);
        assert_eq!(
            fake.calls(),
            vec![Call::File("README.md".to_string(), Some("dev".to_string()))]
        );
    }

    #[tokio::test]
    async fn different_refs_are_cached_separately() {
        let fake = Arc::new(FakeUpstream::new().with_file("a.txt", Ok(encoded("a.txt", "x"))));
        let explorer = explorer(Arc::clone(&fake));

        explorer.fetch_file(&request("a.txt", None)).await.unwrap();
        explorer.fetch_file(&request("a.txt", Some("main"))).await.unwrap();

        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let fake = Arc::new(FakeUpstream::new().with_file("gone.txt", Err(not_found())));
        let explorer = explorer(Arc::clone(&fake));
        let req = request("gone.txt", None);

        assert_eq!(
            explorer.fetch_file(&req).await.unwrap_err(),
            ExplorerError::Upstream(not_found())
        );
        assert!(explorer.fetch_file(&req).await.is_err());
        assert_eq!(fake.calls().len(), 2);
        assert!(explorer.cache().is_empty());
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_decode_failure() {
        let bad = UpstreamFile {
            path: "x.bin".to_string(),
            content: "%%%".to_string(),
            encoding: Some("base64".to_string()),
            size: 3,
        };
        let fake = Arc::new(FakeUpstream::new().with_file("x.bin", Ok(bad)));
        let explorer = explorer(fake);

        let err = explorer.fetch_file(&request("x.bin", None)).await.unwrap_err();
        assert!(matches!(err, ExplorerError::Upstream(UpstreamError::Decode(_))));
        assert_eq!(err.message(), "unexpected response from upstream");
    }
}
