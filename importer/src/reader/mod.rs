//! Read side of the importer: access to the source chain.
//!
//! This module defines the [`ChainReader`] trait consumed by the import
//! loop and its error type. The concrete JSON-RPC client lives in
//! [`jsonrpc`].

pub mod jsonrpc;

pub use jsonrpc::JsonRpcChainReader;

use thiserror::Error;

use crate::types::{BlockHash, BlockPayload};

/// Errors returned by a [`ChainReader`].
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain service could not be reached, timed out, or answered 5xx
    /// without a JSON-RPC body.
    #[error("chain service unavailable: {0}")]
    UpstreamUnavailable(String),
    /// The chain service does not know the requested block.
    #[error("block {0} not found")]
    NotFound(BlockHash),
    /// The chain service answered with an explicit JSON-RPC error.
    #[error("chain RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// The response did not have the expected shape.
    #[error("chain protocol error: {0}")]
    Protocol(String),
}

/// Abstract access to a block-oriented ledger.
///
/// All calls are stateless request/response round-trips; implementations
/// may keep connection pools and credentials but no traversal state.
pub trait ChainReader {
    /// Returns the hash of the chain's current head.
    fn best_block_hash(&self) -> Result<BlockHash, ChainError>;

    /// Returns the raw serialized bytes of `hash`.
    fn block_payload(&self, hash: &BlockHash) -> Result<BlockPayload, ChainError>;

    /// Returns the parent of `hash`, or `None` if `hash` is the genesis block.
    fn parent_hash(&self, hash: &BlockHash) -> Result<Option<BlockHash>, ChainError>;
}

impl<R: ChainReader + ?Sized> ChainReader for &R {
    fn best_block_hash(&self) -> Result<BlockHash, ChainError> {
        (**self).best_block_hash()
    }

    fn block_payload(&self, hash: &BlockHash) -> Result<BlockPayload, ChainError> {
        (**self).block_payload(hash)
    }

    fn parent_hash(&self, hash: &BlockHash) -> Result<Option<BlockHash>, ChainError> {
        (**self).parent_hash(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-block chain: `01` is the head, `00` is genesis.
    struct TwoBlocks;

    impl ChainReader for TwoBlocks {
        fn best_block_hash(&self) -> Result<BlockHash, ChainError> {
            Ok(BlockHash::parse("01").unwrap())
        }

        fn block_payload(&self, hash: &BlockHash) -> Result<BlockPayload, ChainError> {
            Ok(BlockPayload::new(hash.as_str().as_bytes().to_vec()))
        }

        fn parent_hash(&self, hash: &BlockHash) -> Result<Option<BlockHash>, ChainError> {
            match hash.as_str() {
                "01" => Ok(Some(BlockHash::parse("00").unwrap())),
                "00" => Ok(None),
                _ => Err(ChainError::NotFound(hash.clone())),
            }
        }
    }

    #[test]
    fn chain_reader_trait_is_object_safe() {
        fn head_of(reader: &dyn ChainReader) -> BlockHash {
            reader.best_block_hash().unwrap()
        }

        assert_eq!(head_of(&TwoBlocks).as_str(), "01");
    }

    #[test]
    fn references_forward_to_the_reader() {
        let reader = &TwoBlocks;
        let head = reader.best_block_hash().unwrap();
        let parent = (&reader).parent_hash(&head).unwrap();
        assert_eq!(parent.map(String::from).as_deref(), Some("00"));
    }

    #[test]
    fn not_found_names_the_block() {
        let err = TwoBlocks
            .parent_hash(&BlockHash::parse("ff").unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "block ff not found");
    }
}
