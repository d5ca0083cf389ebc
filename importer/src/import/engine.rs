//! The backwards import loop.
//!
//! The importer wires together:
//!
//! - a [`ChainReader`] for block bytes and parent links,
//! - a [`StoreWriter`] that persists each block under a fixed [`Codec`],
//! - an output sink receiving one `<hash> = <cid>` line per block.
//!
//! It walks from the starting block to genesis, one block at a time,
//! strictly sequentially. The only traversal state is the cursor carried
//! inside [`ImportState`].

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::ImportError;
use super::state::{ImportOutcome, ImportState, ImportSummary, StopReason};
use crate::config::ImportOptions;
use crate::metrics::MetricsRegistry;
use crate::reader::{ChainError, ChainReader};
use crate::types::{BlockHash, Codec, ImportRecord};
use crate::writer::StoreWriter;

/// Progress of a run, kept outside the state so terminal states can report it.
#[derive(Debug, Default)]
struct Progress {
    imported: u64,
    last_imported: Option<BlockHash>,
}

/// Sequential chain-to-store importer.
///
/// This struct is generic over:
///
/// - `R`: source chain implementing [`ChainReader`],
/// - `W`: content-addressed store implementing [`StoreWriter`].
pub struct Importer<R, W> {
    reader: R,
    writer: W,
    codec: Codec,
    options: ImportOptions,
    metrics: Option<Arc<MetricsRegistry>>,
    cancel: CancellationToken,
}

impl<R, W> Importer<R, W>
where
    R: ChainReader,
    W: StoreWriter,
{
    /// Creates a new importer. `codec` is used for every block of every run.
    pub fn new(reader: R, writer: W, codec: Codec, options: ImportOptions) -> Self {
        Self {
            reader,
            writer,
            codec,
            options,
            metrics: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Records call latencies and counters into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Makes the run stop at the next state transition once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Walks the chain and writes one record per imported block to `out`.
    ///
    /// Chain and store failures end the run and are reported through
    /// [`ImportSummary::outcome`]; only a failing `out` makes this return
    /// `Err`.
    pub fn run<O: Write>(&self, out: &mut O) -> io::Result<ImportSummary> {
        let mut progress = Progress::default();
        let mut state = ImportState::Start;

        info!(
            codec = %self.codec,
            start = ?self.options.start.as_ref().map(BlockHash::as_str),
            "starting import"
        );

        loop {
            if !state.is_terminal() && self.cancel.is_cancelled() {
                state = ImportState::Cancelled;
            }

            state = match state {
                ImportState::Done(reason) => {
                    info!(imported = progress.imported, "import finished: {reason}");
                    return Ok(self.summary(ImportOutcome::Done(reason), progress));
                }
                ImportState::Failed(err) => {
                    error!(
                        imported = progress.imported,
                        last_imported = ?progress.last_imported.as_ref().map(BlockHash::as_str),
                        "import failed: {err}"
                    );
                    if let Some(m) = &self.metrics {
                        m.import.failures.inc();
                    }
                    return Ok(self.summary(ImportOutcome::Failed(err), progress));
                }
                ImportState::Cancelled => {
                    warn!(
                        imported = progress.imported,
                        last_imported = ?progress.last_imported.as_ref().map(BlockHash::as_str),
                        "import cancelled"
                    );
                    return Ok(self.summary(ImportOutcome::Cancelled, progress));
                }
                live => {
                    debug!(state = live.name(), "import step");
                    self.step(live, &mut progress, out)?
                }
            };
        }
    }

    /// Performs the I/O of one non-terminal state and returns the next one.
    fn step<O: Write>(
        &self,
        state: ImportState,
        progress: &mut Progress,
        out: &mut O,
    ) -> io::Result<ImportState> {
        let next = match state {
            ImportState::Start => {
                if self.options.max_blocks == Some(0) {
                    return Ok(ImportState::Done(StopReason::LimitReached));
                }
                match &self.options.start {
                    Some(hash) => ImportState::Reading(hash.clone()),
                    None => match self.chain_call(|| self.reader.best_block_hash()) {
                        Ok(best) => {
                            info!(best = %best, "starting from best block");
                            ImportState::Reading(best)
                        }
                        Err(e) => ImportState::Failed(e),
                    },
                }
            }

            ImportState::Reading(cursor) => {
                match self.chain_call(|| self.reader.block_payload(&cursor)) {
                    Ok(payload) => ImportState::Writing(cursor, payload),
                    Err(e) => ImportState::Failed(e),
                }
            }

            ImportState::Writing(cursor, payload) => {
                let started = Instant::now();
                let put = self.retrying(|| self.writer.put_block(&payload, &self.codec));
                if let Some(m) = &self.metrics {
                    m.import
                        .store_put_seconds
                        .observe(started.elapsed().as_secs_f64());
                }

                match put {
                    Ok(cid) => {
                        let record = ImportRecord { block: cursor, cid };
                        writeln!(out, "{record}")?;
                        out.flush()?;

                        if let Some(m) = &self.metrics {
                            m.import.blocks_imported.inc();
                            m.import.bytes_imported.inc_by(payload.len() as u64);
                        }

                        progress.imported += 1;
                        progress.last_imported = Some(record.block.clone());
                        self.after_write(record.block, progress.imported)
                    }
                    Err(e) => ImportState::Failed(e),
                }
            }

            ImportState::Advancing(cursor) => {
                match self.chain_call(|| self.reader.parent_hash(&cursor)) {
                    Ok(Some(parent)) if parent == cursor => ImportState::Failed(
                        ChainError::Protocol(format!("block {cursor} lists itself as parent"))
                            .into(),
                    ),
                    Ok(Some(parent)) => ImportState::Reading(parent),
                    Ok(None) => ImportState::Done(StopReason::GenesisReached),
                    Err(e) => ImportState::Failed(e),
                }
            }

            terminal => terminal,
        };

        Ok(next)
    }

    /// Applies the explicit stop conditions after a block was written.
    fn after_write(&self, cursor: BlockHash, imported: u64) -> ImportState {
        if self.options.stop_at.as_ref() == Some(&cursor) {
            ImportState::Done(StopReason::StopHashReached)
        } else if self.options.max_blocks.is_some_and(|max| imported >= max) {
            ImportState::Done(StopReason::LimitReached)
        } else {
            ImportState::Advancing(cursor)
        }
    }

    /// Runs a chain RPC through the retry policy and records its latency.
    fn chain_call<T>(&self, call: impl FnMut() -> Result<T, ChainError>) -> Result<T, ImportError> {
        let started = Instant::now();
        let result = self.retrying(call);
        if let Some(m) = &self.metrics {
            m.import.rpc_seconds.observe(started.elapsed().as_secs_f64());
        }
        result
    }

    /// Calls `call` until it succeeds, fails terminally, or attempts run out.
    fn retrying<T, E>(&self, mut call: impl FnMut() -> Result<T, E>) -> Result<T, ImportError>
    where
        E: Into<ImportError>,
    {
        let retry = &self.options.retry;
        let mut attempt = 1;

        loop {
            let err = match call() {
                Ok(v) => return Ok(v),
                Err(e) => e.into(),
            };

            if !err.is_retryable() || attempt >= retry.max_attempts || self.cancel.is_cancelled()
            {
                return Err(err);
            }

            warn!(
                attempt,
                max_attempts = retry.max_attempts,
                "retrying after transport error: {err}"
            );
            if let Some(m) = &self.metrics {
                m.import.retries.inc();
            }
            attempt += 1;
            std::thread::sleep(retry.backoff);
        }
    }

    fn summary(&self, outcome: ImportOutcome, progress: Progress) -> ImportSummary {
        ImportSummary {
            outcome,
            imported: progress.imported,
            last_imported: progress.last_imported,
        }
    }
}
