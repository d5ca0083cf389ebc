//! Top-level configuration for an import run.
//!
//! This module aggregates configuration for:
//!
//! - the chain JSON-RPC endpoint and its credentials (`RpcConfig`),
//! - the IPFS API endpoint (`StoreConfig`),
//! - retry behaviour for transport failures (`RetryConfig`),
//! - the metrics exporter (`MetricsConfig`),
//! - and the traversal itself: codec, start block and stop conditions.
//!
//! Everything is passed explicitly into the clients and the importer;
//! there is no process-wide client state.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::types::{BlockHash, Codec};

/// Error returned by [`ImporterConfig::validate`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("codec must not be empty")]
    EmptyCodec,
    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("retry max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("{name} URL {url:?} must start with http:// or https://")]
    BadUrl { name: &'static str, url: String },
}

/// Configuration for the chain JSON-RPC client.
#[derive(Clone, Debug)]
pub struct RpcConfig {
    /// Node RPC URL, e.g. `"http://127.0.0.1:8232"`.
    pub url: String,
    /// Basic-auth user name.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8232".to_string(),
            username: "user".to_string(),
            password: "password".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for the IPFS store client.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Root of the IPFS HTTP API, e.g. `"http://127.0.0.1:5001"`.
    pub api_url: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5001".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Retry policy for transport-level failures.
///
/// Only errors for which `ImportError::is_retryable` holds are retried;
/// protocol errors, unknown blocks and store rejections always fail the
/// run on the first occurrence.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts per call, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Default)]
pub struct MetricsConfig {
    /// Address to serve `/metrics` on. `None` disables the exporter.
    pub listen_addr: Option<SocketAddr>,
}

/// Traversal options that shape a single run of the import loop.
#[derive(Clone, Debug, Default)]
pub struct ImportOptions {
    /// Block to start from. `None` starts from the chain's best block.
    pub start: Option<BlockHash>,
    /// Stop after importing this block.
    pub stop_at: Option<BlockHash>,
    /// Stop after importing this many blocks.
    pub max_blocks: Option<u64>,
    pub retry: RetryConfig,
}

/// Top-level configuration for an import run.
#[derive(Clone, Debug, Default)]
pub struct ImporterConfig {
    pub rpc: RpcConfig,
    pub store: StoreConfig,
    /// Codec every block of this run is submitted with.
    pub codec: Codec,
    pub options: ImportOptions,
    pub metrics: MetricsConfig,
}

fn check_url(name: &'static str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::BadUrl {
            name,
            url: url.to_string(),
        })
    }
}

impl ImporterConfig {
    /// Rejects settings that would make the run fail or hang on the first call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.codec.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyCodec);
        }
        check_url("rpc", &self.rpc.url)?;
        check_url("store", &self.store.api_url)?;
        if self.rpc.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("rpc"));
        }
        if self.store.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("store"));
        }
        if self.options.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}
