//! The import loop and its state machine.
//!
//! The importer lives in [`engine`], its states and results in [`state`],
//! and the combined error type in [`error`].

pub mod engine;
pub mod error;
pub mod state;

pub use engine::Importer;
pub use error::ImportError;
pub use state::{ImportOutcome, ImportState, ImportSummary, StopReason};
