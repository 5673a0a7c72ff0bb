//! Inbound engine: mailbox → object store.
//!
//! One invocation fetches one chunk, persists its bytes and rewrites the
//! continuation state. Acknowledging the message is strictly the last
//! effect of a transfer: it is what tells the server not to redeliver,
//! so it must never precede the terminal write.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info};

use meshbridge_mailbox::{ChunkMeta, MailboxApi, MailboxConfig};
use meshbridge_protocol::{InboundState, MessageType, PartEtag};
use meshbridge_store::{MIN_PART_SIZE, ObjectStore};

use crate::{READ_BLOCK_SIZE, TransferError, overflow};

/// Drives inbound transfers against an object store.
pub struct InboundEngine {
    store: Arc<dyn ObjectStore>,
    read_block: usize,
    min_part_size: usize,
}

impl InboundEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            read_block: READ_BLOCK_SIZE,
            min_part_size: MIN_PART_SIZE as usize,
        }
    }

    /// Overrides the read-block size (tests).
    pub fn with_read_block(mut self, read_block: usize) -> Self {
        self.read_block = read_block;
        self
    }

    /// Overrides the minimum part size (tests).
    pub fn with_min_part_size(mut self, min_part_size: usize) -> Self {
        self.min_part_size = min_part_size;
        self
    }

    /// Performs one state transition for the message in `state`.
    pub async fn step(
        &self,
        mailbox: &mut dyn MailboxApi,
        config: &MailboxConfig,
        mut state: InboundState,
    ) -> Result<InboundState, TransferError> {
        if state.complete {
            return Err(TransferError::AlreadyComplete);
        }
        info!(
            internal_id = %state.internal_id,
            message_id = %state.message_id,
            chunk = state.current_chunk,
            "inbound step"
        );

        let download = mailbox
            .get_chunk(&state.message_id, state.current_chunk)
            .await?;
        let meta = download.meta;

        // The server's chunk range is authoritative; stale local counts
        // are reconciled to it.
        if let Some(range) = meta.chunk_range {
            if range.total != state.total_chunks {
                info!(
                    internal_id = %state.internal_id,
                    local = state.total_chunks,
                    server = range.total,
                    "reconciling total chunks to server"
                );
                state.total_chunks = range.total;
            }
        }

        let filename = meta
            .filename
            .clone()
            .unwrap_or_else(|| format!("{}.dat", state.message_id));
        let bucket = config.inbound_bucket.clone();
        let key = config.inbound_key(&filename);

        if meta.message_type == MessageType::Report {
            return self.write_report(mailbox, &bucket, &key, &meta, state).await;
        }

        if state.total_chunks <= 1 {
            let data = download.body.read_to_end().await?;
            self.store.put_object(&bucket, &key, &data).await.map_err(|e| {
                error!(bucket = %bucket, key = %key, error = %e, "single put failed");
                e
            })?;
            mailbox.acknowledge(&state.message_id).await?;
            state.complete = true;
            return Ok(state);
        }

        self.accumulate_chunk(mailbox, &bucket, &key, &meta, download.body, state)
            .await
    }

    /// Reports are never chunked; the payload is the response header set.
    async fn write_report(
        &self,
        mailbox: &mut dyn MailboxApi,
        bucket: &str,
        key: &str,
        meta: &ChunkMeta,
        mut state: InboundState,
    ) -> Result<InboundState, TransferError> {
        let headers: BTreeMap<&str, &str> = meta
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        let payload = serde_json::to_vec(&headers)
            .map_err(|e| meshbridge_protocol::RecordError::Malformed(e.to_string()))?;
        self.store.put_object(bucket, key, &payload).await.map_err(|e| {
            error!(bucket = %bucket, key = %key, error = %e, "report put failed");
            e
        })?;
        mailbox.acknowledge(&state.message_id).await?;
        info!(internal_id = %state.internal_id, key = %key, "report persisted");
        state.complete = true;
        Ok(state)
    }

    /// Streams one chunk of a multi-chunk message into multipart parts.
    async fn accumulate_chunk(
        &self,
        mailbox: &mut dyn MailboxApi,
        bucket: &str,
        key: &str,
        meta: &ChunkMeta,
        mut body: meshbridge_mailbox::ChunkBody,
        mut state: InboundState,
    ) -> Result<InboundState, TransferError> {
        let upload_id = match &state.aws_upload_id {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .store
                    .create_multipart_upload(bucket, key)
                    .await
                    .map_err(|e| {
                        error!(bucket = %bucket, key = %key, error = %e, "multipart create failed");
                        e
                    })?;
                state.aws_upload_id = Some(id.clone());
                id
            }
        };

        // Bytes below the minimum part size carried over from the
        // previous chunk, prepended before the next upload.
        let mut pending = overflow::load(self.store.as_ref(), bucket, key, &upload_id).await?;
        let mut block = Vec::with_capacity(self.read_block);

        while let Some(fragment) = body.next_fragment().await {
            let bytes =
                fragment.map_err(|e| meshbridge_mailbox::MailboxError::Body(e.to_string()))?;
            block.extend_from_slice(&bytes);
            while block.len() >= self.read_block {
                let rest = block.split_off(self.read_block);
                let full = std::mem::replace(&mut block, rest);
                pending.extend_from_slice(&full);
                if pending.len() >= self.min_part_size {
                    self.upload_part(bucket, key, &upload_id, &mut state, std::mem::take(&mut pending))
                        .await?;
                }
            }
        }
        if !block.is_empty() {
            pending.extend_from_slice(&block);
            if pending.len() >= self.min_part_size {
                self.upload_part(bucket, key, &upload_id, &mut state, std::mem::take(&mut pending))
                    .await?;
            }
        }

        let is_final = meta
            .chunk_range
            .map(|r| r.is_final())
            .unwrap_or(state.current_chunk >= state.total_chunks);

        if is_final {
            // The last part may be undersized.
            if !pending.is_empty() {
                self.upload_part(bucket, key, &upload_id, &mut state, pending)
                    .await?;
            }
            self.store
                .complete_multipart_upload(bucket, key, &upload_id, &state.aws_part_etags)
                .await
                .map_err(|e| {
                    error!(
                        bucket = %bucket,
                        key = %key,
                        upload_id = %upload_id,
                        error = %e,
                        "multipart complete failed"
                    );
                    e
                })?;
            overflow::clear(self.store.as_ref(), bucket, key, &upload_id).await?;
            mailbox.acknowledge(&state.message_id).await?;
            info!(
                internal_id = %state.internal_id,
                key = %key,
                parts = state.aws_part_etags.len(),
                "inbound transfer complete"
            );
            state.complete = true;
        } else {
            overflow::save(self.store.as_ref(), bucket, key, &upload_id, &pending).await?;
            state.current_chunk += 1;
        }
        Ok(state)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        state: &mut InboundState,
        data: Vec<u8>,
    ) -> Result<(), TransferError> {
        let part_number = state.aws_current_part_id;
        let etag = self
            .store
            .upload_part(bucket, key, upload_id, part_number, data)
            .await
            .map_err(|e| {
                error!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    part = part_number,
                    error = %e,
                    "part upload failed"
                );
                e
            })?;
        state.aws_part_etags.push(PartEtag { part_number, etag });
        state.aws_current_part_id += 1;
        Ok(())
    }
}
