//! Write side of the importer: the content-addressed store.
//!
//! [`StoreWriter`] is the only place where block data is persisted. The
//! IPFS HTTP implementation lives in [`ipfs`].

pub mod ipfs;

pub use ipfs::IpfsStoreWriter;

use thiserror::Error;

use crate::types::{BlockPayload, Codec, ContentId};

/// Errors returned by a [`StoreWriter`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached, timed out, or answered 5xx without
    /// an error envelope.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// The store explicitly refused the submission.
    #[error("store rejected block: {0}")]
    StoreRejected(String),
    /// The store answered, but not with a content identifier.
    #[error("malformed store response: {0}")]
    MalformedResponse(String),
}

/// Abstract content-addressed store.
///
/// Submitting the same bytes with the same codec is always safe to retry,
/// but implementations must not assume the call is idempotent.
pub trait StoreWriter {
    /// Persists `payload` interpreted as `codec` and returns its identifier.
    fn put_block(&self, payload: &BlockPayload, codec: &Codec) -> Result<ContentId, StoreError>;
}

impl<W: StoreWriter + ?Sized> StoreWriter for &W {
    fn put_block(&self, payload: &BlockPayload, codec: &Codec) -> Result<ContentId, StoreError> {
        (**self).put_block(payload, codec)
    }
}
