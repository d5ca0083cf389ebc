//! JSON-RPC chain reader.
//!
//! This implementation of [`ChainReader`] talks to a bitcoind-family node
//! (bitcoind, zcashd, ...) over HTTP with basic auth. It assumes the node
//! exposes the classic JSON-RPC 1.0 interface:
//!
//! ```json
//! POST /
//! { "jsonrpc": "1.0", "id": 7, "method": "getblock", "params": ["<hash>", false] }
//!
//! Response:
//! { "result": "<raw block hex>", "error": null, "id": 7 }
//! ```
//!
//! Errors are reported in the same envelope, usually with HTTP status 500:
//!
//! ```json
//! { "result": null, "error": { "code": -5, "message": "Block not found" }, "id": 7 }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ChainError, ChainReader};
use crate::config::RpcConfig;
use crate::types::{BlockHash, BlockPayload};

/// JSON-RPC error code bitcoind-family nodes use for unknown blocks.
pub const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

/// Blocking JSON-RPC client for the source chain.
///
/// The underlying `reqwest` client is built once with the configured
/// timeout and reused for every call, so connections are pooled across
/// iterations of the import loop.
pub struct JsonRpcChainReader {
    url: String,
    username: String,
    password: String,
    client: Client,
    next_id: AtomicU64,
}

impl fmt::Debug for JsonRpcChainReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcChainReader")
            .field("url", &self.url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl JsonRpcChainReader {
    /// Constructs a reader for the node described by `cfg`.
    pub fn new(cfg: &RpcConfig) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| {
                ChainError::UpstreamUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            url: cfg.url.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Performs one JSON-RPC call and returns the raw `result` value.
    fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = RpcRequest {
            jsonrpc: "1.0",
            id,
            method,
            params,
        };

        let resp = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&req)
            .send()
            .map_err(|e| {
                ChainError::UpstreamUnavailable(format!("{method} via {} failed: {e}", self.url))
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|e| {
            ChainError::UpstreamUnavailable(format!("reading {method} response failed: {e}"))
        })?;

        // bitcoind answers errors with a non-2xx status *and* a JSON body,
        // so the body wins whenever it parses.
        let body: RpcResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            // An overloaded node (e.g. "Work queue depth exceeded") or a
            // proxy in front of it; worth another attempt.
            Err(_) if status.is_server_error() => {
                return Err(ChainError::UpstreamUnavailable(format!(
                    "{method} returned HTTP status {status}: {}",
                    text.trim()
                )));
            }
            Err(_) if !status.is_success() => {
                return Err(ChainError::Protocol(format!(
                    "{method} returned HTTP status {status}"
                )));
            }
            Err(e) => {
                return Err(ChainError::Protocol(format!(
                    "{method} returned invalid JSON-RPC envelope: {e}"
                )));
            }
        };

        if let Some(err) = body.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(body.result)
    }

    /// Like [`Self::call`], but turns "unknown block" errors into
    /// [`ChainError::NotFound`] for `hash`.
    fn call_for_block(
        &self,
        method: &str,
        hash: &BlockHash,
        params: Vec<Value>,
    ) -> Result<Value, ChainError> {
        self.call(method, params).map_err(|e| match e {
            ChainError::Rpc { code, .. } if code == RPC_INVALID_ADDRESS_OR_KEY => {
                ChainError::NotFound(hash.clone())
            }
            other => other,
        })
    }
}

/// Request envelope sent to the node.
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

/// Response envelope returned by the node.
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// The slice of a verbose `getblock` result the importer cares about.
///
/// Nodes disagree on casing for the parent field; both spellings are
/// accepted. Genesis carries neither.
#[derive(Debug, Deserialize)]
struct VerboseBlock {
    #[serde(default, alias = "previousBlockHash")]
    previousblockhash: Option<String>,
}

fn expect_string(method: &str, value: Value) -> Result<String, ChainError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ChainError::Protocol(format!(
            "{method} result should be a string, got {other}"
        ))),
    }
}

impl ChainReader for JsonRpcChainReader {
    fn best_block_hash(&self) -> Result<BlockHash, ChainError> {
        let result = self.call("getbestblockhash", Vec::new())?;
        let raw = expect_string("getbestblockhash", result)?;
        BlockHash::parse(raw)
            .map_err(|e| ChainError::Protocol(format!("getbestblockhash: {e}")))
    }

    fn block_payload(&self, hash: &BlockHash) -> Result<BlockPayload, ChainError> {
        let result = self.call_for_block("getblock", hash, vec![json!(hash), json!(false)])?;
        let raw = expect_string("getblock", result)?;
        BlockPayload::from_hex(&raw)
            .map_err(|e| ChainError::Protocol(format!("getblock {hash} returned bad hex: {e}")))
    }

    fn parent_hash(&self, hash: &BlockHash) -> Result<Option<BlockHash>, ChainError> {
        let result = self.call_for_block("getblock", hash, vec![json!(hash)])?;
        if !result.is_object() {
            return Err(ChainError::Protocol(format!(
                "verbose getblock {hash} should return an object"
            )));
        }

        let block: VerboseBlock = serde_json::from_value(result).map_err(|e| {
            ChainError::Protocol(format!("verbose getblock {hash} has bad parent field: {e}"))
        })?;

        block
            .previousblockhash
            .map(|parent| {
                BlockHash::parse(parent)
                    .map_err(|e| ChainError::Protocol(format!("parent of {hash}: {e}")))
            })
            .transpose()
    }
}
