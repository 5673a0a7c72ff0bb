//! The seam between the transfer engines and the mailbox server.
//!
//! Engines only see [`MailboxApi`]; [`crate::MailboxSession`] is the
//! production implementation and tests substitute a scripted mock.

use async_trait::async_trait;

use meshbridge_protocol::{ChunkRange, MessageType};

use crate::{ChunkBody, MailboxError};

/// Metadata parsed from a chunk-fetch response.
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub status: u16,
    /// Server-authoritative position; `None` when the header is absent
    /// (single-chunk messages may omit it).
    pub chunk_range: Option<ChunkRange>,
    pub message_type: MessageType,
    pub filename: Option<String>,
    /// Full response header set, kept because report messages persist it
    /// as their payload.
    pub headers: Vec<(String, String)>,
}

/// A fetched chunk: parsed metadata plus the unconsumed body.
#[derive(Debug)]
pub struct ChunkDownload {
    pub meta: ChunkMeta,
    pub body: ChunkBody,
}

/// One outbound chunk handed to [`MailboxApi::send_chunk`].
#[derive(Debug)]
pub struct SendChunk {
    pub filename: String,
    /// 1-based chunk number.
    pub chunk: u32,
    pub total_chunks: u32,
    /// Required for every chunk after the first; the server issued it on
    /// chunk 1 and uses it to associate the chunks of one message.
    pub message_id: Option<String>,
    pub compressed: bool,
    pub body: ChunkBody,
}

/// The mailbox operations the transfer engines drive.
#[async_trait]
pub trait MailboxApi: Send {
    /// Mailbox name this session is bound to.
    fn mailbox(&self) -> &str;

    /// Liveness/credential check; returns the raw HTTP status.
    async fn handshake(&mut self) -> Result<u16, MailboxError>;

    /// Lists pending inbox message ids, oldest first. An empty inbox is
    /// an empty list, not an error.
    async fn list_messages(&mut self) -> Result<Vec<String>, MailboxError>;

    /// Fetches one chunk of one message, body unconsumed.
    async fn get_chunk(
        &mut self,
        message_id: &str,
        chunk: u32,
    ) -> Result<ChunkDownload, MailboxError>;

    /// Tells the server the message is fully persisted and must not be
    /// redelivered. Must only be called after the terminal write.
    async fn acknowledge(&mut self, message_id: &str) -> Result<(), MailboxError>;

    /// Posts one chunk and returns the message id from the response.
    async fn send_chunk(&mut self, chunk: SendChunk) -> Result<String, MailboxError>;
}
