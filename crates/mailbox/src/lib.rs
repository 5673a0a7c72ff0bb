//! Authenticated session against the message-exchange server.
//!
//! A session binds one mailbox name to an HTTP client carrying that
//! mailbox's TLS material and HMAC credentials. Sessions are constructed
//! per invocation and never reused across invocations.

mod api;
mod body;
mod config;
mod session;

pub use api::{ChunkDownload, ChunkMeta, MailboxApi, SendChunk};
pub use body::{BodyFragment, ChunkBody};
pub use config::MailboxConfig;
pub use session::MailboxSession;

/// Errors from mailbox operations.
///
/// Nothing here is retried internally; each invocation is itself the
/// scheduler's retry unit.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mailbox request returned {status}: {url}")]
    Status { status: u16, url: String },

    /// The server withdrew the message (HTTP 410). Terminal for the
    /// message, never retried.
    #[error("message {message_id} withdrawn by server")]
    MessageGone { message_id: String },

    #[error("malformed mailbox response: {0}")]
    MalformedResponse(String),

    #[error("malformed mailbox configuration: {0}")]
    MalformedConfig(String),

    /// The session was built without a send target but asked to send.
    #[error("session has no destination mailbox configured")]
    NoSendTarget,

    #[error("body read failed: {0}")]
    Body(String),
}
