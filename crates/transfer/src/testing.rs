//! Scripted mailbox mock shared by the engine tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;

use meshbridge_mailbox::{
    ChunkBody, ChunkDownload, ChunkMeta, MailboxApi, MailboxConfig, MailboxError, SendChunk,
};
use meshbridge_protocol::{ChunkRange, MessageType};

/// A sent chunk captured with its body fully drained.
pub struct SentChunk {
    pub filename: String,
    pub chunk: u32,
    pub total_chunks: u32,
    pub message_id: Option<String>,
    pub body: Vec<u8>,
    pub fragments: usize,
}

/// Replays scripted responses and records every call.
pub struct MockMailbox {
    mailbox: String,
    chunks: VecDeque<Result<ChunkDownload, MailboxError>>,
    pub acks: Vec<String>,
    pub sends: Vec<SentChunk>,
    send_ids: VecDeque<String>,
    on_send: Option<Box<dyn FnMut() + Send>>,
}

impl MockMailbox {
    pub fn new(mailbox: &str) -> Self {
        Self {
            mailbox: mailbox.to_string(),
            chunks: VecDeque::new(),
            acks: Vec::new(),
            sends: Vec::new(),
            send_ids: VecDeque::new(),
            on_send: None,
        }
    }

    pub fn push_chunk(&mut self, chunk: Result<ChunkDownload, MailboxError>) {
        self.chunks.push_back(chunk);
    }

    pub fn push_send_id(&mut self, id: &str) {
        self.send_ids.push_back(id.to_string());
    }

    /// Runs `hook` at the start of every send, before the body is drained.
    /// Lets a test mutate the store between the engine's HEAD and the
    /// body's lazy reads.
    pub fn on_send(&mut self, hook: impl FnMut() + Send + 'static) {
        self.on_send = Some(Box::new(hook));
    }
}

#[async_trait]
impl MailboxApi for MockMailbox {
    fn mailbox(&self) -> &str {
        &self.mailbox
    }

    async fn handshake(&mut self) -> Result<u16, MailboxError> {
        Ok(200)
    }

    async fn list_messages(&mut self) -> Result<Vec<String>, MailboxError> {
        Ok(Vec::new())
    }

    async fn get_chunk(
        &mut self,
        message_id: &str,
        _chunk: u32,
    ) -> Result<ChunkDownload, MailboxError> {
        self.chunks
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted get_chunk for {message_id}"))
    }

    async fn acknowledge(&mut self, message_id: &str) -> Result<(), MailboxError> {
        self.acks.push(message_id.to_string());
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: SendChunk) -> Result<String, MailboxError> {
        if let Some(hook) = self.on_send.as_mut() {
            hook();
        }
        let mut body = chunk.body;
        let mut collected = Vec::new();
        let mut fragments = 0;
        while let Some(fragment) = body.next_fragment().await {
            let bytes = fragment.map_err(|e| MailboxError::Body(e.to_string()))?;
            collected.extend_from_slice(&bytes);
            fragments += 1;
        }
        let id = self
            .send_ids
            .pop_front()
            .unwrap_or_else(|| format!("SRV-{}", self.sends.len() + 1));
        self.sends.push(SentChunk {
            filename: chunk.filename,
            chunk: chunk.chunk,
            total_chunks: chunk.total_chunks,
            message_id: chunk.message_id,
            body: collected,
            fragments,
        });
        Ok(id)
    }
}

/// A data chunk with an optional `current:total` range and filename.
pub fn data_chunk(range: Option<(u32, u32)>, filename: Option<&str>, body: Vec<u8>) -> ChunkDownload {
    let status = match range {
        Some((current, total)) if current < total => 206,
        _ => 200,
    };
    ChunkDownload {
        meta: ChunkMeta {
            status,
            chunk_range: range.map(|(current, total)| ChunkRange { current, total }),
            message_type: MessageType::Data,
            filename: filename.map(str::to_string),
            headers: Vec::new(),
        },
        body: ChunkBody::from_stream(stream::iter([Ok(Bytes::from(body))])),
    }
}

/// A report message carrying the given response headers and no body.
pub fn report_chunk(headers: &[(&str, &str)]) -> ChunkDownload {
    ChunkDownload {
        meta: ChunkMeta {
            status: 200,
            chunk_range: None,
            message_type: MessageType::Report,
            filename: None,
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        },
        body: ChunkBody::empty(),
    }
}

pub fn test_mailbox_config() -> MailboxConfig {
    MailboxConfig {
        base_url: "https://mesh.example".into(),
        shared_key: "BackBone".into(),
        password: "pw".into(),
        client_cert_pem: None,
        client_key_pem: None,
        ca_cert_pem: None,
        verify_ssl: true,
        inbound_bucket: "transfers".into(),
        inbound_folder: "inbound".into(),
    }
}
