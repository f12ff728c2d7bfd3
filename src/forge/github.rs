//! GitHub / GitHub Enterprise implementation of [`Upstream`].

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::metrics::{EndpointLabels, FailureLabels, MetricsRegistry};

use super::rate_limit::RateLimitState;
use super::{Upstream, UpstreamBranch, UpstreamError, UpstreamFile, UpstreamTree};

const ACCEPT_GITHUB_V3: &str = "application/vnd.github.v3+json";

// ---------------------------------------------------------------------------
// Client struct
// ---------------------------------------------------------------------------

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: Url,
    token: Option<String>,
    rate_limit: RateLimitState,
    metrics: MetricsRegistry,
}

impl GitHubClient {
    /// Build a client with the configured timeout and identification header.
    pub fn new(
        config: &UpstreamConfig,
        token: Option<String>,
        rate_limit: RateLimitState,
        metrics: MetricsRegistry,
    ) -> Result<Self> {
        let api_url = Url::parse(config.api_url.trim_end_matches('/'))
            .with_context(|| format!("invalid upstream api_url: {}", config.api_url))?;
        anyhow::ensure!(
            !api_url.cannot_be_a_base(),
            "upstream api_url must be a hierarchical URL: {api_url}"
        );

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_GITHUB_V3));

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_url,
            token,
            rate_limit,
            metrics,
        })
    }

    /// `{api_url}/repos/{owner}/{repo}/{tail...}` with every segment
    /// percent-encoded on its own, so a ref like `feature/x` stays one segment.
    fn repo_url<'a>(
        &self,
        owner: &str,
        repo: &str,
        tail: impl IntoIterator<Item = &'a str>,
    ) -> Url {
        let mut url = self.api_url.clone();
        // Infallible: `new` rejects cannot-be-a-base URLs.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", owner, repo])
                .extend(tail);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
    ) -> Result<T, UpstreamError> {
        self.get_with(endpoint, url, |body| {
            serde_json::from_slice(body).map_err(decode_error)
        })
        .await
    }

    /// Issue one GET and hand the successful body to `decode`.  Failures from
    /// either step are counted and logged against `endpoint`.
    async fn get_with<T>(
        &self,
        endpoint: &'static str,
        url: Url,
        decode: impl FnOnce(&[u8]) -> Result<T, UpstreamError> + Send,
    ) -> Result<T, UpstreamError> {
        let metrics = &self.metrics.metrics;
        metrics
            .upstream_api_calls
            .get_or_create(&EndpointLabels {
                endpoint: endpoint.to_string(),
            })
            .inc();

        debug!(%url, endpoint, "upstream request");

        let mut request = self.http.get(url.clone());
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let result = self.send(request).await.and_then(|body| decode(&body));
        if let Err(err) = &result {
            metrics
                .upstream_api_failures
                .get_or_create(&FailureLabels {
                    class: err.class().to_string(),
                })
                .inc();
            warn!(%url, endpoint, class = err.class(), error = %err, "upstream call failed");
        }
        result
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Bytes, UpstreamError> {
        let resp = request
            .send()
            .await
            .map_err(|e| UpstreamError::from_transport(&e))?;

        self.rate_limit.update_from_headers(resp.headers());
        let remaining = self.rate_limit.remaining();
        if remaining != u64::MAX {
            self.metrics
                .metrics
                .upstream_api_rate_limit_remaining
                .set(i64::try_from(remaining).unwrap_or(i64::MAX));
        }

        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::from_response(status, &headers, &body));
        }

        resp.bytes()
            .await
            .map_err(|e| UpstreamError::from_transport(&e))
    }
}

fn decode_error(err: serde_json::Error) -> UpstreamError {
    UpstreamError::Decode(err.to_string())
}

// ---------------------------------------------------------------------------
// Trait implementation
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl Upstream for GitHubClient {
    async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        tree_ish: &str,
    ) -> Result<UpstreamTree, UpstreamError> {
        let mut url = self.repo_url(owner, repo, ["git", "trees", tree_ish]);
        url.query_pairs_mut().append_pair("recursive", "1");
        self.get_json("tree", url).await
    }

    async fn get_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<UpstreamBranch, UpstreamError> {
        let url = self.repo_url(owner, repo, ["branches", branch]);
        self.get_json("branch", url).await
    }

    async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<UpstreamFile, UpstreamError> {
        let mut url = self.repo_url(
            owner,
            repo,
            std::iter::once("contents").chain(path.split('/')),
        );
        if let Some(git_ref) = git_ref {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }

        // A directory path answers with a listing instead of a file object.
        self.get_with("contents", url, |body| {
            let value: serde_json::Value = serde_json::from_slice(body).map_err(decode_error)?;
            if value.is_array() {
                return Err(UpstreamError::Decode(format!(
                    "{path} is a directory, not a file"
                )));
            }
            serde_json::from_value(value).map_err(decode_error)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
