//! The continuation record threaded between invocations.
//!
//! An invocation receives one record, performs one unit of work and emits
//! an updated record; the external scheduler owns it in between. The body
//! is a tagged sum of the inbound and outbound state shapes, validated at
//! the boundary so malformed input fails with a typed error instead of a
//! missing-field panic deep inside an engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Error raised when a record cannot be validated at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed continuation record: {0}")]
    Malformed(String),
}

/// Function input/output envelope: `{statusCode, headers, body}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationRecord<T = TransferState> {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: T,
}

impl<T> ContinuationRecord<T> {
    pub fn new(status_code: u16, body: T) -> Self {
        Self {
            status_code,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl<T: DeserializeOwned> ContinuationRecord<T> {
    /// Parses and validates a record, rejecting malformed input.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(|e| RecordError::Malformed(e.to_string()))
    }
}

impl<T: Serialize> ContinuationRecord<T> {
    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string(self).map_err(|e| RecordError::Malformed(e.to_string()))
    }
}

/// Body of a continuation record, discriminated by transfer direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransferState {
    Outbound(OutboundState),
    Inbound(InboundState),
}

/// One uploaded multipart part, in the storage engine's own JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartEtag {
    #[serde(rename = "PartNumber")]
    pub part_number: i32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Progress of one inbound (mailbox → object store) transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InboundState {
    pub message_id: String,
    pub dest_mailbox: String,
    /// Next chunk to fetch, 1-based.
    #[serde(default = "one_u32")]
    pub current_chunk: u32,
    /// Reconciled against the server's `Mex-Chunk-Range` on every step.
    #[serde(default = "one_u32")]
    pub total_chunks: u32,
    #[serde(default)]
    pub complete: bool,
    /// Multipart-upload handle; `None` until the upload is created.
    #[serde(default)]
    pub aws_upload_id: Option<String>,
    /// Next part number to write, 1-based.
    #[serde(default = "one_i32")]
    pub aws_current_part_id: i32,
    #[serde(default)]
    pub aws_part_etags: Vec<PartEtag>,
    /// Correlation id threaded through every record of one transfer.
    #[serde(default)]
    pub internal_id: String,
}

impl InboundState {
    pub fn new(message_id: impl Into<String>, dest_mailbox: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            dest_mailbox: dest_mailbox.into(),
            current_chunk: 1,
            total_chunks: 1,
            complete: false,
            aws_upload_id: None,
            aws_current_part_id: 1,
            aws_part_etags: Vec::new(),
            internal_id: String::new(),
        }
    }
}

/// Progress of one outbound (object store → mailbox) transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboundState {
    pub src_mailbox: String,
    pub dest_mailbox: String,
    pub workflow_id: String,
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub chunked: bool,
    /// Chunk being sent this invocation, 1-based.
    #[serde(default = "one_u32")]
    pub chunk_number: u32,
    #[serde(default = "one_u32")]
    pub total_chunks: u32,
    pub chunk_size: u64,
    #[serde(default)]
    pub current_byte_position: u64,
    #[serde(default = "one_u32")]
    pub compress_ratio: u32,
    #[serde(default)]
    pub will_compress: bool,
    /// Issued by the server on chunk 1; required on every later chunk.
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub internal_id: String,
}

fn one_u32() -> u32 {
    1
}

fn one_i32() -> i32 {
    1
}
