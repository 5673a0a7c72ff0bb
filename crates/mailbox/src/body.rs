//! Streaming chunk bodies.
//!
//! A chunk body is handed to the caller unconsumed so the caller decides
//! how bytes are read: the inbound engine re-buffers fragments into
//! part-sized blocks, the outbound engine produces fragments lazily from
//! ranged object reads without holding a whole chunk in memory.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};

use crate::MailboxError;

/// One fragment of a chunk body.
pub type BodyFragment = Result<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// A lazily-read sequence of byte fragments.
pub struct ChunkBody {
    inner: Pin<Box<dyn Stream<Item = BodyFragment> + Send>>,
}

impl ChunkBody {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = BodyFragment> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::from_stream(stream::iter([Ok(data.into())]))
    }

    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    /// Yields the next fragment, or `None` at end of body.
    pub async fn next_fragment(&mut self) -> Option<BodyFragment> {
        self.inner.next().await
    }

    /// Drains the body into memory. Only for payloads known to be small
    /// (single-chunk messages, reports).
    pub async fn read_to_end(mut self) -> Result<Vec<u8>, MailboxError> {
        let mut out = Vec::new();
        while let Some(fragment) = self.next_fragment().await {
            let bytes = fragment.map_err(|e| MailboxError::Body(e.to_string()))?;
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Unwraps the stream (to hand to an HTTP request body).
    pub fn into_stream(self) -> Pin<Box<dyn Stream<Item = BodyFragment> + Send>> {
        self.inner
    }
}

impl std::fmt::Debug for ChunkBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChunkBody(..)")
    }
}
