//! Chunked transfer engines bridging the mailbox server and object storage.
//!
//! Each engine performs exactly one unit of work per call and rewrites the
//! continuation state it was given; the external scheduler re-invokes with
//! the returned state until `complete` is set. Nothing survives between
//! invocations except that state.

pub mod handler;
mod inbound;
mod outbound;
mod overflow;
mod planner;
mod prepare;

#[cfg(test)]
mod testing;

pub use inbound::InboundEngine;
pub use outbound::OutboundEngine;
pub use overflow::overflow_key;
pub use planner::{ChunkPlan, PlanError, plan};
pub use prepare::{PrepareError, SendRequest, prepare_send};

use meshbridge_mailbox::MailboxError;
use meshbridge_protocol::RecordError;
use meshbridge_store::StorageError;

/// Default wire chunk size: 100 MiB. Independent of both the read-block
/// size and the storage engine's minimum part size.
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Size of one buffered read when streaming a chunk body: 16 MiB.
pub const READ_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Errors produced by the transfer engines.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A record with `complete = true` was fed back in. Contract
    /// violation, never a retryable condition.
    #[error("transfer already complete; record must not be re-submitted")]
    AlreadyComplete,

    #[error("source object is empty or missing: s3://{bucket}/{key}")]
    EmptySource { bucket: String, key: String },

    /// The plan and the actual object no longer agree; sending more would
    /// exceed the planned byte range.
    #[error("byte position {position} exceeds the planned transfer range")]
    MaxBytesExceeded { position: u64 },

    #[error("message id missing on chunk {chunk}; the server issues it on chunk 1")]
    MissingMessageId { chunk: u32 },

    /// Compression is carried in the record for forward compatibility but
    /// is disabled.
    #[error("compression requested but support is disabled")]
    CompressionDisabled,
}
