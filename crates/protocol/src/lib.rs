//! Wire protocol types for the MESH message-exchange bridge.
//!
//! Everything here is pure data: header names, the HMAC authorization
//! token, chunk-range bookkeeping and the continuation record that is
//! threaded between invocations. No network access, no I/O.

pub mod auth;
pub mod headers;
pub mod record;
mod types;

pub use record::{ContinuationRecord, InboundState, OutboundState, PartEtag, RecordError, TransferState};
pub use types::{ChunkRange, MessageType};

/// Errors from parsing wire-level protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid chunk range: {0:?}")]
    InvalidChunkRange(String),
}
