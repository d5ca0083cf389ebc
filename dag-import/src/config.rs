//! Command-line configuration.
//!
//! Every flag maps onto a field of [`importer::ImporterConfig`]; endpoints
//! and credentials can also come from the environment so they stay out of
//! shell history.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use importer::{
    BlockHash, Codec, ImportOptions, ImporterConfig, MetricsConfig, RetryConfig, RpcConfig,
    StoreConfig,
};

/// Import a blockchain into IPFS, walking from a block back to genesis.
///
/// Prints one `<block hash> = <cid>` line per imported block.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Block to start from. Defaults to the node's best block.
    #[arg(value_parser = parse_hash)]
    pub start: Option<BlockHash>,

    /// Blockchain type; used as the IPFS input format for every block.
    #[arg(long = "type", default_value = Codec::DEFAULT)]
    pub chain_type: String,

    /// URL of the node's JSON-RPC endpoint.
    #[arg(long, env = "DAG_IMPORT_RPC_URL", default_value = "http://127.0.0.1:8232")]
    pub rpc_url: String,

    /// JSON-RPC user name.
    #[arg(long, env = "DAG_IMPORT_RPC_USER", default_value = "user")]
    pub rpc_user: String,

    /// JSON-RPC password.
    #[arg(
        long,
        env = "DAG_IMPORT_RPC_PASSWORD",
        default_value = "password",
        hide_env_values = true
    )]
    pub rpc_password: String,

    /// Per-call timeout for JSON-RPC requests, in seconds.
    #[arg(long, default_value_t = 30)]
    pub rpc_timeout_secs: u64,

    /// Root URL of the IPFS HTTP API.
    #[arg(long, env = "DAG_IMPORT_IPFS_URL", default_value = "http://127.0.0.1:5001")]
    pub ipfs_url: String,

    /// Per-call timeout for `dag/put`, in seconds.
    #[arg(long, default_value_t = 60)]
    pub ipfs_timeout_secs: u64,

    /// Stop after importing this block.
    #[arg(long, value_parser = parse_hash)]
    pub stop_at: Option<BlockHash>,

    /// Stop after importing this many blocks.
    #[arg(long)]
    pub max_blocks: Option<u64>,

    /// Extra attempts for calls that failed at the transport level.
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Pause between retry attempts, in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub retry_backoff_ms: u64,

    /// Serve Prometheus metrics on this address, e.g. `127.0.0.1:9898`.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

fn parse_hash(s: &str) -> Result<BlockHash, String> {
    BlockHash::parse(s).map_err(|e| e.to_string())
}

impl Cli {
    /// Converts the parsed flags into an importer configuration.
    pub fn into_config(self) -> ImporterConfig {
        ImporterConfig {
            rpc: RpcConfig {
                url: self.rpc_url,
                username: self.rpc_user,
                password: self.rpc_password,
                timeout: Duration::from_secs(self.rpc_timeout_secs),
            },
            store: StoreConfig {
                api_url: self.ipfs_url,
                timeout: Duration::from_secs(self.ipfs_timeout_secs),
            },
            codec: Codec::new(self.chain_type),
            options: ImportOptions {
                start: self.start,
                stop_at: self.stop_at,
                max_blocks: self.max_blocks,
                retry: RetryConfig {
                    max_attempts: self.retries.saturating_add(1),
                    backoff: Duration::from_millis(self.retry_backoff_ms),
                },
            },
            metrics: MetricsConfig {
                listen_addr: self.metrics_addr,
            },
        }
    }
}
