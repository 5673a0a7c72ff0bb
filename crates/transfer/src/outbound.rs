//! Outbound engine: object store → mailbox.
//!
//! One invocation sends one wire chunk as a stream of ranged object
//! reads, so no invocation ever holds a full chunk in memory.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures_util::stream;
use tracing::{error, info};

use meshbridge_mailbox::{ChunkBody, MailboxApi, SendChunk};
use meshbridge_protocol::OutboundState;
use meshbridge_store::ObjectStore;

use crate::{READ_BLOCK_SIZE, TransferError};

/// Drives outbound transfers from an object store.
pub struct OutboundEngine {
    store: Arc<dyn ObjectStore>,
    read_block: usize,
}

impl OutboundEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            read_block: READ_BLOCK_SIZE,
        }
    }

    /// Overrides the read-block size (tests).
    pub fn with_read_block(mut self, read_block: usize) -> Self {
        self.read_block = read_block;
        self
    }

    /// Sends the next chunk described by `state`.
    pub async fn step(
        &self,
        mailbox: &mut dyn MailboxApi,
        mut state: OutboundState,
    ) -> Result<OutboundState, TransferError> {
        if state.complete {
            return Err(TransferError::AlreadyComplete);
        }
        if state.will_compress {
            return Err(TransferError::CompressionDisabled);
        }
        if state.chunk_number > state.total_chunks {
            return Err(TransferError::MaxBytesExceeded {
                position: state.current_byte_position,
            });
        }
        if state.chunk_number > 1 && state.message_id.is_none() {
            return Err(TransferError::MissingMessageId {
                chunk: state.chunk_number,
            });
        }
        info!(
            internal_id = %state.internal_id,
            chunk = state.chunk_number,
            of = state.total_chunks,
            key = %state.key,
            "outbound step"
        );

        let size = self
            .store
            .head_object(&state.bucket, &state.key)
            .await?
            .filter(|s| *s > 0)
            .ok_or_else(|| TransferError::EmptySource {
                bucket: state.bucket.clone(),
                key: state.key.clone(),
            })?;

        let start = state.current_byte_position;
        if start >= size {
            return Err(TransferError::MaxBytesExceeded { position: start });
        }
        // The compress ratio widens the read window so a compressed chunk
        // would still fill a full wire chunk. With compression disabled
        // the ratio stays 1 and this is just the chunk size.
        let window = state.chunk_size * u64::from(state.compress_ratio.max(1));
        let end_excl = (start + window).min(size);

        let filename = state
            .key
            .rsplit('/')
            .next()
            .unwrap_or(state.key.as_str())
            .to_string();
        // Records the byte position at which the source ran out of bytes
        // mid-send, however the aborted request itself surfaces.
        let truncated: Arc<OnceLock<u64>> = Arc::new(OnceLock::new());
        let body = range_body(
            self.store.clone(),
            state.bucket.clone(),
            state.key.clone(),
            start,
            end_excl,
            self.read_block,
            truncated.clone(),
        );

        let sent = mailbox
            .send_chunk(SendChunk {
                filename,
                chunk: state.chunk_number,
                total_chunks: state.total_chunks,
                message_id: state.message_id.clone(),
                compressed: false,
                body,
            })
            .await;
        let message_id = match sent {
            Ok(id) => id,
            Err(e) => {
                if let Some(&position) = truncated.get() {
                    error!(
                        internal_id = %state.internal_id,
                        key = %state.key,
                        position,
                        "source shrank during transfer"
                    );
                    return Err(TransferError::MaxBytesExceeded { position });
                }
                return Err(e.into());
            }
        };

        if state.message_id.is_none() {
            state.message_id = Some(message_id);
        }
        state.current_byte_position = end_excl;
        if !state.chunked || state.chunk_number >= state.total_chunks {
            info!(
                internal_id = %state.internal_id,
                message_id = state.message_id.as_deref().unwrap_or(""),
                bytes = state.current_byte_position,
                "outbound transfer complete"
            );
            state.complete = true;
        } else {
            state.chunk_number += 1;
        }
        Ok(state)
    }
}

/// Lazily reads `[start, end_excl)` from the object in read-block sized
/// fragments. An in-range read returning no bytes records its position in
/// `truncated` and aborts the stream.
fn range_body(
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    start: u64,
    end_excl: u64,
    read_block: usize,
    truncated: Arc<OnceLock<u64>>,
) -> ChunkBody {
    ChunkBody::from_stream(stream::try_unfold(
        (store, bucket, key, start),
        move |(store, bucket, key, pos)| {
            let truncated = truncated.clone();
            async move {
                if pos >= end_excl {
                    return Ok(None);
                }
                let end = (pos + read_block as u64).min(end_excl) - 1;
                let data = store
                    .get_range(&bucket, &key, pos, end)
                    .await
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
                if data.is_empty() {
                    let _ = truncated.set(pos);
                    return Err(format!("no bytes at position {pos} of s3://{bucket}/{key}").into());
                }
                let next = pos + data.len() as u64;
                Ok(Some((Bytes::from(data), (store, bucket, key, next))))
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMailbox;
    use meshbridge_store::MemoryStore;

    fn engine(store: &Arc<MemoryStore>) -> OutboundEngine {
        OutboundEngine::new(store.clone() as Arc<dyn ObjectStore>)
    }

    fn state(chunk_size: u64, total_chunks: u32) -> OutboundState {
        OutboundState {
            src_mailbox: "MESH-UI-01".into(),
            dest_mailbox: "MESH-UI-02".into(),
            workflow_id: "API-DOCS".into(),
            bucket: "transfers".into(),
            key: "outbound/data.csv".into(),
            chunked: total_chunks > 1,
            chunk_number: 1,
            total_chunks,
            chunk_size,
            current_byte_position: 0,
            compress_ratio: 1,
            will_compress: false,
            message_id: None,
            complete: false,
            internal_id: "test-internal".into(),
        }
    }

    #[tokio::test]
    async fn unchunked_file_sends_once_and_completes() {
        let store = Arc::new(MemoryStore::new());
        store.insert("transfers", "outbound/data.csv", b"hello world".to_vec());
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        mailbox.push_send_id("MSG-20260830");

        let out = engine(&store)
            .step(&mut mailbox, state(100, 1))
            .await
            .unwrap();

        assert!(out.complete);
        assert_eq!(out.message_id.as_deref(), Some("MSG-20260830"));
        assert_eq!(out.current_byte_position, 11);
        assert_eq!(mailbox.sends.len(), 1);
        assert_eq!(mailbox.sends[0].filename, "data.csv");
        assert_eq!(mailbox.sends[0].body, b"hello world");
        assert_eq!(mailbox.sends[0].message_id, None);
    }

    #[tokio::test]
    async fn chunked_file_resumes_across_steps() {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            "transfers",
            "outbound/data.csv",
            [b"0123456789".repeat(3), b"abcde".to_vec()].concat(),
        );
        let eng = engine(&store);
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        mailbox.push_send_id("MSG-A");

        // 35 bytes at 10 per chunk: 4 chunks, last of 5 bytes.
        let mut st = state(10, 4);
        for expected_chunk in 1..=4u32 {
            assert_eq!(st.chunk_number, expected_chunk);
            st = eng.step(&mut mailbox, st).await.unwrap();
        }

        assert!(st.complete);
        assert_eq!(st.current_byte_position, 35);
        assert_eq!(mailbox.sends.len(), 4);
        // The server-issued id from chunk 1 accompanies every later chunk.
        assert_eq!(mailbox.sends[0].message_id, None);
        for send in &mailbox.sends[1..] {
            assert_eq!(send.message_id.as_deref(), Some("MSG-A"));
        }
        let sizes: Vec<usize> = mailbox.sends.iter().map(|s| s.body.len()).collect();
        assert_eq!(sizes, vec![10, 10, 10, 5]);
    }

    #[tokio::test]
    async fn chunk_streams_in_read_block_fragments() {
        let store = Arc::new(MemoryStore::new());
        store.insert("transfers", "outbound/data.csv", b"0123456789".to_vec());
        let mut mailbox = MockMailbox::new("MESH-UI-01");

        let out = engine(&store)
            .with_read_block(4)
            .step(&mut mailbox, state(100, 1))
            .await
            .unwrap();

        assert!(out.complete);
        assert_eq!(mailbox.sends[0].fragments, 3);
        assert_eq!(mailbox.sends[0].body, b"0123456789");
    }

    #[tokio::test]
    async fn completed_state_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        let mut st = state(10, 1);
        st.complete = true;
        let err = engine(&store).step(&mut mailbox, st).await.unwrap_err();
        assert!(matches!(err, TransferError::AlreadyComplete));
    }

    #[tokio::test]
    async fn missing_source_is_empty_source() {
        let store = Arc::new(MemoryStore::new());
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        let err = engine(&store)
            .step(&mut mailbox, state(10, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::EmptySource { .. }));
        assert!(mailbox.sends.is_empty());
    }

    #[tokio::test]
    async fn zero_byte_source_is_empty_source() {
        let store = Arc::new(MemoryStore::new());
        store.insert("transfers", "outbound/data.csv", Vec::new());
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        let err = engine(&store)
            .step(&mut mailbox, state(10, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::EmptySource { .. }));
    }

    #[tokio::test]
    async fn later_chunk_without_message_id_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        store.insert("transfers", "outbound/data.csv", b"x".repeat(20));
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        let mut st = state(10, 2);
        st.chunk_number = 2;
        st.current_byte_position = 10;
        let err = engine(&store).step(&mut mailbox, st).await.unwrap_err();
        assert!(matches!(err, TransferError::MissingMessageId { chunk: 2 }));
    }

    #[tokio::test]
    async fn compression_request_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        let mut st = state(10, 1);
        st.will_compress = true;
        let err = engine(&store).step(&mut mailbox, st).await.unwrap_err();
        assert!(matches!(err, TransferError::CompressionDisabled));
    }

    #[tokio::test]
    async fn source_shrinking_mid_send_is_max_bytes_exceeded() {
        let store = Arc::new(MemoryStore::new());
        store.insert("transfers", "outbound/data.csv", b"x".repeat(20));
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        // The object shrinks after the HEAD, while the body is read.
        let shrunk = store.clone();
        mailbox.on_send(move || {
            shrunk.insert("transfers", "outbound/data.csv", b"x".repeat(5));
        });

        let err = engine(&store)
            .with_read_block(10)
            .step(&mut mailbox, state(10, 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::MaxBytesExceeded { position: 5 }
        ));
    }

    #[tokio::test]
    async fn position_past_end_is_max_bytes_exceeded() {
        let store = Arc::new(MemoryStore::new());
        store.insert("transfers", "outbound/data.csv", b"x".repeat(8));
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        let mut st = state(10, 2);
        st.chunk_number = 2;
        st.message_id = Some("MSG-A".into());
        st.current_byte_position = 10;
        let err = engine(&store).step(&mut mailbox, st).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::MaxBytesExceeded { position: 10 }
        ));
    }

    #[tokio::test]
    async fn chunk_number_past_total_is_max_bytes_exceeded() {
        let store = Arc::new(MemoryStore::new());
        let mut mailbox = MockMailbox::new("MESH-UI-01");
        let mut st = state(10, 2);
        st.chunk_number = 3;
        st.message_id = Some("MSG-A".into());
        let err = engine(&store).step(&mut mailbox, st).await.unwrap_err();
        assert!(matches!(err, TransferError::MaxBytesExceeded { .. }));
    }
}
