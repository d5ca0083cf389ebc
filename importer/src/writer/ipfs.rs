//! IPFS `dag/put` store writer.
//!
//! Blocks are submitted to the IPFS HTTP API as a single-part multipart
//! upload whose content is the block's hex text:
//!
//! ```text
//! POST /api/v0/dag/put?input-enc=hex&format=zcash
//! Content-Type: multipart/form-data; boundary=...
//!
//! --boundary
//! Content-Disposition: form-data; name="file"; filename="block"
//!
//! 0400000000...
//! ```
//!
//! On success the node answers with a link object:
//!
//! ```json
//! { "Cid": { "/": "z4QJh..." } }
//! ```
//!
//! and on failure with its standard error envelope:
//!
//! ```json
//! { "Message": "unknown input format", "Code": 0, "Type": "error" }
//! ```

use reqwest::blocking::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use serde_json::Value;

use super::{StoreError, StoreWriter};
use crate::config::StoreConfig;
use crate::types::{BlockPayload, Codec, ContentId};

const DAG_PUT_PATH: &str = "api/v0/dag/put";

/// Blocking client for an IPFS node's `dag/put` endpoint.
#[derive(Debug)]
pub struct IpfsStoreWriter {
    api_url: String,
    client: Client,
}

impl IpfsStoreWriter {
    /// Constructs a writer for the IPFS API described by `cfg`.
    ///
    /// `cfg.api_url` should be the root of the API, e.g.
    /// `"http://127.0.0.1:5001"`.
    pub fn new(cfg: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| StoreError::StoreUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_url: cfg.api_url.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        // Avoid accidental double slashes.
        format!("{}/{}", self.api_url.trim_end_matches('/'), DAG_PUT_PATH)
    }
}

/// Success envelope of `dag/put`. Older and newer nodes differ in casing.
#[derive(Debug, Deserialize)]
struct DagPutResponse {
    #[serde(rename = "Cid", alias = "cid")]
    cid: Option<Value>,
}

/// IPLD link object: `{"/": "<cid>"}`.
#[derive(Debug, Deserialize)]
struct CidLink {
    #[serde(rename = "/")]
    target: String,
}

/// Standard IPFS API error envelope.
#[derive(Debug, Deserialize)]
struct IpfsErrorBody {
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Type", default)]
    kind: Option<String>,
}

fn parse_dag_put(status: reqwest::StatusCode, text: &str) -> Result<ContentId, StoreError> {
    let value: Option<Value> = serde_json::from_str(text).ok();

    if let Some(err) = value
        .as_ref()
        .and_then(|v| IpfsErrorBody::deserialize(v).ok())
    {
        if !status.is_success() || err.kind.as_deref() == Some("error") {
            return Err(StoreError::StoreRejected(err.message));
        }
    }

    // No IPFS envelope: a 5xx comes from the node being down or a proxy in
    // front of it, not from the node refusing the block.
    if status.is_server_error() {
        return Err(StoreError::StoreUnavailable(format!(
            "HTTP status {status}: {}",
            text.trim()
        )));
    }

    if !status.is_success() {
        return Err(StoreError::StoreRejected(format!(
            "HTTP status {status}: {}",
            text.trim()
        )));
    }

    let value = value.ok_or_else(|| {
        StoreError::MalformedResponse(format!("response is not JSON: {}", text.trim()))
    })?;

    let resp = DagPutResponse::deserialize(&value)
        .map_err(|e| StoreError::MalformedResponse(format!("unexpected envelope: {e}")))?;

    let link = resp
        .cid
        .ok_or_else(|| StoreError::MalformedResponse("missing Cid field".to_string()))?;

    let link = CidLink::deserialize(&link)
        .map_err(|e| StoreError::MalformedResponse(format!("Cid is not a link object: {e}")))?;

    if link.target.is_empty() {
        return Err(StoreError::MalformedResponse("empty Cid".to_string()));
    }

    Ok(ContentId::new(link.target))
}

impl StoreWriter for IpfsStoreWriter {
    fn put_block(&self, payload: &BlockPayload, codec: &Codec) -> Result<ContentId, StoreError> {
        let url = self.endpoint();
        let form = Form::new().part("file", Part::text(payload.to_hex()).file_name("block"));

        let resp = self
            .client
            .post(&url)
            .query(&[("input-enc", "hex"), ("format", codec.as_str())])
            .multipart(form)
            .send()
            .map_err(|e| StoreError::StoreUnavailable(format!("HTTP POST {url} failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| StoreError::StoreUnavailable(format!("reading dag/put response: {e}")))?;

        parse_dag_put(status, &text)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;

    fn writer_for(server: &MockServer) -> IpfsStoreWriter {
        let cfg = StoreConfig {
            api_url: server.base_url(),
            timeout: Duration::from_secs(5),
        };
        IpfsStoreWriter::new(&cfg).expect("client should build")
    }

    #[test]
    fn put_block_posts_hex_multipart_with_codec() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v0/dag/put")
                .query_param("input-enc", "hex")
                .query_param("format", "zcash")
                .header_exists("content-type")
                .body_contains("name=\"file\"")
                .body_contains("cafebabe");
            then.status(200)
                .json_body(json!({"Cid": {"/": "z4QJhCafe"}}));
        });

        let payload = BlockPayload::new(vec![0xca, 0xfe, 0xba, 0xbe]);
        let cid = writer_for(&server)
            .put_block(&payload, &Codec::new("zcash"))
            .expect("put should succeed");

        assert_eq!(cid.as_str(), "z4QJhCafe");
        mock.assert();
    }

    #[test]
    fn explicit_error_payload_is_a_rejection() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v0/dag/put");
            then.status(500).json_body(json!({
                "Message": "unknown input format \"nope\"",
                "Code": 0,
                "Type": "error"
            }));
        });

        let err = writer_for(&server)
            .put_block(&BlockPayload::new(vec![1]), &Codec::new("nope"))
            .unwrap_err();

        match err {
            StoreError::StoreRejected(msg) => assert!(msg.contains("unknown input format")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unreachable_node_is_store_unavailable() {
        let cfg = StoreConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
        };
        let writer = IpfsStoreWriter::new(&cfg).unwrap();

        let err = writer
            .put_block(&BlockPayload::new(vec![1]), &Codec::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::StoreUnavailable(_)));
    }

    #[test]
    fn lower_case_cid_key_is_accepted() {
        let cid = parse_dag_put(StatusCode::OK, r#"{"cid":{"/":"bafyLower"}}"#).unwrap();
        assert_eq!(cid.as_str(), "bafyLower");
    }

    #[test]
    fn missing_or_misshapen_cid_is_malformed() {
        for body in [
            r#"{}"#,
            r#"{"Cid":"bafyFlat"}"#,
            r#"{"Cid":{"/":""}}"#,
            "definitely not json",
        ] {
            let err = parse_dag_put(StatusCode::OK, body).unwrap_err();
            assert!(
                matches!(err, StoreError::MalformedResponse(_)),
                "{body}: {err:?}"
            );
        }
    }

    #[test]
    fn non_json_server_error_is_store_unavailable() {
        for status in [StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE] {
            let err = parse_dag_put(status, "<html>upstream gone</html>").unwrap_err();
            match &err {
                StoreError::StoreUnavailable(msg) => {
                    assert!(msg.contains(status.as_str()), "{msg}")
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert!(crate::ImportError::from(err).is_retryable());
        }
    }

    #[test]
    fn server_error_with_ipfs_envelope_stays_a_rejection() {
        let body = json!({"Message": "invalid block", "Code": 0, "Type": "error"}).to_string();
        let err = parse_dag_put(StatusCode::INTERNAL_SERVER_ERROR, &body).unwrap_err();
        assert!(matches!(err, StoreError::StoreRejected(msg) if msg == "invalid block"));
    }

    #[test]
    fn non_json_client_error_is_a_rejection() {
        let err = parse_dag_put(StatusCode::PAYLOAD_TOO_LARGE, "request too large").unwrap_err();
        match &err {
            StoreError::StoreRejected(msg) => assert!(msg.contains("413"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!crate::ImportError::from(err).is_retryable());
    }
}
