//! Importer library crate.
//!
//! This crate provides the building blocks for archiving a blockchain
//! into a content-addressed store, newest block first:
//!
//! - strongly-typed domain types (`types`),
//! - the source chain reader and its JSON-RPC client (`reader`),
//! - the store writer and its IPFS `dag/put` client (`writer`),
//! - the sequential import state machine (`import`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level run configuration (`config`).
//!
//! Binaries compose these pieces: build the two clients from an
//! [`ImporterConfig`], hand them to an [`Importer`] and stream its
//! records to stdout.

pub mod config;
pub mod import;
pub mod metrics;
pub mod reader;
pub mod types;
pub mod writer;

// Re-export top-level configuration types.
pub use config::{
    ConfigError, ImportOptions, ImporterConfig, MetricsConfig, RetryConfig, RpcConfig,
    StoreConfig,
};

// Re-export the import loop.
pub use import::{ImportError, ImportOutcome, ImportState, ImportSummary, Importer, StopReason};

// Re-export client interfaces and their HTTP implementations.
pub use reader::{ChainError, ChainReader, JsonRpcChainReader};
pub use writer::{IpfsStoreWriter, StoreError, StoreWriter};

// Re-export metrics registry and exporter.
pub use metrics::{ImportMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the importer stack used by the command-line tool.
///
/// This uses:
///
/// - [`JsonRpcChainReader`] against a bitcoind-family node,
/// - [`IpfsStoreWriter`] against an IPFS HTTP API.
pub type DefaultImporter = Importer<JsonRpcChainReader, IpfsStoreWriter>;

/// Builds the default importer stack from `cfg`.
///
/// The configuration is validated first; client construction errors are
/// reported as the corresponding import error.
pub fn build_default_importer(cfg: &ImporterConfig) -> Result<DefaultImporter, BuildError> {
    cfg.validate()?;
    let reader = JsonRpcChainReader::new(&cfg.rpc).map_err(ImportError::from)?;
    let writer = IpfsStoreWriter::new(&cfg.store).map_err(ImportError::from)?;
    Ok(Importer::new(
        reader,
        writer,
        cfg.codec.clone(),
        cfg.options.clone(),
    ))
}

/// Error returned by [`build_default_importer`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to set up clients: {0}")]
    Client(#[from] ImportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stack_builds_from_default_config() {
        let importer = build_default_importer(&ImporterConfig::default()).expect("should build");
        assert_eq!(importer.codec().as_str(), "zcash");
    }

    #[test]
    fn invalid_config_is_rejected_before_clients_are_built() {
        let cfg = ImporterConfig {
            codec: Codec::new(""),
            ..Default::default()
        };
        assert!(matches!(
            build_default_importer(&cfg),
            Err(BuildError::Config(ConfigError::EmptyCodec))
        ));
    }
}
