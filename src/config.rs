use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Service configuration.  Every section is optional in the YAML file; an
/// empty document yields a working setup against `api.github.com`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(alias = "github")]
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub stream: StreamConfig,
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Full URL to the upstream API root (e.g. `https://api.github.com`).
    pub api_url: String,
    /// Name of the environment variable that holds the optional bearer token.
    ///
    /// An unset or empty variable is a valid operating mode: requests go out
    /// unauthenticated and are subject to the lower anonymous rate limit.
    pub token_env: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Value of the `User-Agent` header sent on every upstream call.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            timeout_secs: 20,
            user_agent: "repo-explorer".to_string(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the bearer token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address for the HTTP listener (e.g. `0.0.0.0:3000`).
    pub http_listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_listen: "0.0.0.0:3000".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached trees and files combined.
    pub capacity: usize,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Target number of chunks a tree is split into.
    pub chunk_fan_out: usize,
    /// Minimum number of entries per chunk.
    pub chunk_floor: usize,
    /// Pause between chunks in milliseconds.
    pub chunk_pause_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_fan_out: 12,
            chunk_floor: 10,
            chunk_pause_ms: 15,
        }
    }
}

impl StreamConfig {
    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config = parse_config(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

/// Parse and validate a YAML document.
pub fn parse_config(contents: &str) -> Result<Config> {
    // An empty file deserialises to `null`, which serde_yaml refuses for a
    // struct even with `#[serde(default)]`.
    let config: Config = if contents.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(contents)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
pub fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(
        !config.upstream.api_url.trim().is_empty(),
        "upstream.api_url must not be empty"
    );
    anyhow::ensure!(
        config.upstream.timeout_secs > 0,
        "upstream.timeout_secs must be greater than 0"
    );
    anyhow::ensure!(config.cache.capacity > 0, "cache.capacity must be greater than 0");
    anyhow::ensure!(config.cache.ttl_secs > 0, "cache.ttl_secs must be greater than 0");
    anyhow::ensure!(
        config.stream.chunk_fan_out > 0,
        "stream.chunk_fan_out must be greater than 0"
    );
    anyhow::ensure!(
        config.stream.chunk_floor > 0,
        "stream.chunk_floor must be greater than 0"
    );
    Ok(())
}
