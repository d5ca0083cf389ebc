//! States and results of the import state machine.

use std::fmt;

use super::error::ImportError;
use crate::types::{BlockHash, BlockPayload};

/// Why a run finished without error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopReason {
    /// The last imported block has no parent.
    GenesisReached,
    /// The configured `stop_at` block was imported.
    StopHashReached,
    /// The configured `max_blocks` were imported.
    LimitReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::GenesisReached => "genesis reached",
            StopReason::StopHashReached => "stop block reached",
            StopReason::LimitReached => "block limit reached",
        };
        f.write_str(s)
    }
}

/// A state of the import loop.
///
/// ```text
/// Start -> Reading -> Writing -> Advancing -> Reading -> ... -> Done | Failed
/// ```
///
/// Any non-terminal state can also move to `Cancelled`.
#[derive(Debug)]
pub enum ImportState {
    Start,
    Reading(BlockHash),
    Writing(BlockHash, BlockPayload),
    Advancing(BlockHash),
    Done(StopReason),
    Failed(ImportError),
    Cancelled,
}

impl ImportState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportState::Done(_) | ImportState::Failed(_) | ImportState::Cancelled
        )
    }

    /// Short state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ImportState::Start => "start",
            ImportState::Reading(_) => "reading",
            ImportState::Writing(..) => "writing",
            ImportState::Advancing(_) => "advancing",
            ImportState::Done(_) => "done",
            ImportState::Failed(_) => "failed",
            ImportState::Cancelled => "cancelled",
        }
    }
}

/// Terminal state of a run.
#[derive(Debug)]
pub enum ImportOutcome {
    Done(StopReason),
    Failed(ImportError),
    Cancelled,
}

/// What a run did, returned by `Importer::run`.
#[derive(Debug)]
pub struct ImportSummary {
    pub outcome: ImportOutcome,
    /// Number of blocks written to the store.
    pub imported: u64,
    /// Last block written to the store; a safe point to resume from.
    pub last_imported: Option<BlockHash>,
}

impl ImportSummary {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ImportOutcome::Done(_))
    }
}
