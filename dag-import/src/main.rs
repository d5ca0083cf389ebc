// dag-import/src/main.rs

//! Chain-to-IPFS import binary.
//!
//! Wires up the `importer` crate:
//!
//! - JSON-RPC chain reader (bitcoind / zcashd)
//! - IPFS `dag/put` store writer
//! - optional Prometheus exporter on /metrics
//! - the blocking import loop, cancelled on Ctrl-C
//!
//! Result records go to stdout; everything else is logged to stderr.

mod config;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use config::Cli;
use importer::{ImportOutcome, ImportSummary, MetricsRegistry, run_prometheus_http_server};

/// Exit status for a run interrupted by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "dag_import=info,importer=info".to_string()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) => exit_code(&summary),
        Err(e) => {
            eprintln!("fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ImportSummary, String> {
    let cfg = cli.into_config();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = match cfg.metrics.listen_addr {
        Some(addr) => {
            let metrics = Arc::new(
                MetricsRegistry::new()
                    .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
            );
            let metrics_clone = metrics.clone();
            tokio::spawn(async move {
                if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                    tracing::warn!(%addr, "import metrics exporter stopped: {e}");
                }
            });
            Some(metrics)
        }
        None => None,
    };

    // ---------------------------
    // Cancellation
    // ---------------------------

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    // ---------------------------
    // Importer stack + loop
    // ---------------------------

    // The clients are blocking, so they are built, used and dropped off
    // the async workers.
    tokio::task::spawn_blocking(move || {
        let mut importer = importer::build_default_importer(&cfg).map_err(|e| e.to_string())?;
        if let Some(metrics) = metrics {
            importer = importer.with_metrics(metrics);
        }
        let importer = importer.with_cancellation(cancel);

        let stdout = io::stdout();
        let mut out = stdout.lock();
        importer
            .run(&mut out)
            .map_err(|e| format!("failed to write import record: {e}"))
    })
    .await
    .map_err(|e| format!("import task panicked: {e}"))?
}

/// Maps a finished run onto the process exit status.
///
/// The failure itself, with the last imported block to resume from, has
/// already been logged by the import loop.
fn exit_code(summary: &ImportSummary) -> ExitCode {
    ExitCode::from(exit_status(&summary.outcome))
}

fn exit_status(outcome: &ImportOutcome) -> u8 {
    match outcome {
        ImportOutcome::Done(_) => 0,
        ImportOutcome::Failed(_) => 1,
        ImportOutcome::Cancelled => EXIT_INTERRUPTED,
    }
}

/// Waits for Ctrl-C and cancels the import loop.
async fn shutdown_signal(cancel: CancellationToken) {
    // Wait for Ctrl+C
    if signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
        cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use importer::{BlockHash, ChainError, ImportError, StopReason, StoreError};

    use super::*;

    #[test]
    fn every_completed_walk_exits_zero() {
        for reason in [
            StopReason::GenesisReached,
            StopReason::StopHashReached,
            StopReason::LimitReached,
        ] {
            assert_eq!(exit_status(&ImportOutcome::Done(reason)), 0);
        }
    }

    #[test]
    fn failed_walk_exits_one() {
        let missing = BlockHash::parse("00ab").unwrap();
        let outcomes = [
            ImportOutcome::Failed(ImportError::Chain(ChainError::NotFound(missing))),
            ImportOutcome::Failed(ImportError::Store(StoreError::StoreRejected(
                "invalid block".to_string(),
            ))),
        ];
        for outcome in &outcomes {
            assert_eq!(exit_status(outcome), 1);
        }
    }

    #[test]
    fn interrupted_walk_exits_130() {
        assert_eq!(exit_status(&ImportOutcome::Cancelled), 130);
    }
}
