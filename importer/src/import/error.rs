use thiserror::Error;

use crate::reader::ChainError;
use crate::writer::StoreError;

/// Any error that stops an import run.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Whether the failure is a transport problem that may go away on retry.
    ///
    /// Unknown blocks, malformed responses and explicit store rejections
    /// are terminal: repeating the call would give the same answer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ImportError::Chain(ChainError::UpstreamUnavailable(_))
                | ImportError::Store(StoreError::StoreUnavailable(_))
        )
    }
}
