//! Core domain types used by the importer.
//!
//! This module defines strongly-typed block hashes, raw block payloads,
//! content identifiers and codec tags that flow between the chain reader,
//! the store writer and the import loop. The goal is to avoid "naked"
//! strings and byte buffers in public APIs and instead use domain-specific
//! newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string is not a usable block hash.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InvalidBlockHash {
    #[error("block hash is empty")]
    Empty,
    #[error("block hash {0:?} contains non-hex characters")]
    NotHex(String),
}

/// Identifier of a block in the source chain.
///
/// The chain service hands these out as hex strings (e.g. the output of
/// `getbestblockhash` or the `previousblockhash` field of a verbose block).
/// The importer never interprets the digest itself; it only uses it as a
/// lookup key and as the traversal cursor.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockHash(String);

impl BlockHash {
    /// Parses a hex block hash, rejecting empty and non-hex input.
    ///
    /// The digits are lower-cased, the form nodes report, so hashes typed
    /// by an operator compare equal to the ones the chain hands back.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidBlockHash> {
        let mut s = s.into();
        if s.is_empty() {
            return Err(InvalidBlockHash::Empty);
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidBlockHash::NotHex(s));
        }
        s.make_ascii_lowercase();
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BlockHash {
    type Error = InvalidBlockHash;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<BlockHash> for String {
    fn from(h: BlockHash) -> Self {
        h.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw serialized block bytes as returned by the chain service.
///
/// A payload is read once, handed to the store writer and then dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockPayload(Vec<u8>);

impl BlockPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decodes the hex text produced by a non-verbose `getblock` call.
    pub fn from_hex(data: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(data.trim()).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lower-case hex rendering, the form the store ingests.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Identifier returned by the content-addressed store after a put.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format tag telling the store how to interpret submitted block bytes.
///
/// This is usually the name of the chain family (`zcash`, `bitcoin`, ...)
/// and stays fixed for a whole import run.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Codec(String);

impl Codec {
    /// Codec used when the caller does not pick one.
    pub const DEFAULT: &'static str = "zcash";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of operator output: a source block and where it landed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImportRecord {
    pub block: BlockHash,
    pub cid: ContentId,
}

impl fmt::Display for ImportRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.block, self.cid)
    }
}
