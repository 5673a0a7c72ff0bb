//! HTTP session bound to one mailbox.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, info};

use meshbridge_protocol::auth::AuthState;
use meshbridge_protocol::headers::{
    MEX_CHUNK_RANGE, MEX_FILENAME, MEX_FROM, MEX_MESSAGE_TYPE, MEX_TO, MEX_WORKFLOW_ID,
};
use meshbridge_protocol::{ChunkRange, MessageType};

use crate::api::{ChunkDownload, ChunkMeta, MailboxApi, SendChunk};
use crate::{ChunkBody, MailboxConfig, MailboxError};

/// Authenticated session against one mailbox.
///
/// Owns the HTTP client configured with the mailbox's TLS material and the
/// per-session authorization counter. Constructed per invocation;
/// credentials are dropped with the session.
pub struct MailboxSession {
    mailbox: String,
    config: MailboxConfig,
    client: reqwest::Client,
    auth: AuthState,
    root: String,
    dest_mailbox: Option<String>,
    workflow_id: Option<String>,
}

#[derive(Deserialize)]
struct InboxListing {
    #[serde(default)]
    messages: Vec<String>,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(rename = "messageID")]
    message_id: String,
}

impl MailboxSession {
    /// Builds a session for `mailbox` from its configuration.
    pub fn connect(mailbox: impl Into<String>, config: MailboxConfig) -> Result<Self, MailboxError> {
        let mailbox = mailbox.into();
        let mut builder = reqwest::Client::builder();

        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca) = &config.ca_cert_pem {
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(ca.as_bytes())?);
        }
        if let (Some(cert), Some(key)) = (&config.client_cert_pem, &config.client_key_pem) {
            // rustls takes key and certificate in one PEM bundle.
            let mut bundle = Vec::with_capacity(cert.len() + key.len() + 1);
            bundle.extend_from_slice(key.as_bytes());
            bundle.push(b'\n');
            bundle.extend_from_slice(cert.as_bytes());
            builder = builder.identity(reqwest::Identity::from_pem(&bundle)?);
        }
        let client = builder.build()?;

        let root = format!(
            "{}/messageexchange/{}",
            config.base_url.trim_end_matches('/'),
            mailbox
        );
        Ok(Self {
            mailbox,
            config,
            client,
            auth: AuthState::new(),
            root,
            dest_mailbox: None,
            workflow_id: None,
        })
    }

    /// Sets the destination mailbox and workflow for sending sessions.
    pub fn with_send_target(
        mut self,
        dest_mailbox: impl Into<String>,
        workflow_id: impl Into<String>,
    ) -> Self {
        self.dest_mailbox = Some(dest_mailbox.into());
        self.workflow_id = Some(workflow_id.into());
        self
    }

    fn auth_header(&mut self) -> String {
        self.auth.next_header(
            &self.mailbox,
            &self.config.password,
            &self.config.shared_key,
        )
    }

    fn chunk_url(&self, message_id: &str, chunk: u32) -> String {
        if chunk <= 1 {
            format!("{}/inbox/{message_id}", self.root)
        } else {
            format!("{}/inbox/{message_id}/{chunk}", self.root)
        }
    }

    fn outbox_url(&self, message_id: Option<&str>, chunk: u32) -> String {
        match message_id {
            Some(id) if chunk > 1 => format!("{}/outbox/{id}/{chunk}", self.root),
            _ => format!("{}/outbox", self.root),
        }
    }

    fn status_error(status: reqwest::StatusCode, url: &str) -> MailboxError {
        MailboxError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl MailboxApi for MailboxSession {
    fn mailbox(&self) -> &str {
        &self.mailbox
    }

    async fn handshake(&mut self) -> Result<u16, MailboxError> {
        let url = self.root.clone();
        let auth = self.auth_header();
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;
        let status = response.status().as_u16();
        debug!(mailbox = %self.mailbox, status, "handshake");
        Ok(status)
    }

    async fn list_messages(&mut self) -> Result<Vec<String>, MailboxError> {
        let url = format!("{}/inbox", self.root);
        let auth = self.auth_header();
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response.status(), &url));
        }
        let listing: InboxListing = response
            .json()
            .await
            .map_err(|e| MailboxError::MalformedResponse(e.to_string()))?;
        debug!(mailbox = %self.mailbox, count = listing.messages.len(), "inbox listing");
        Ok(listing.messages)
    }

    async fn get_chunk(
        &mut self,
        message_id: &str,
        chunk: u32,
    ) -> Result<ChunkDownload, MailboxError> {
        let url = self.chunk_url(message_id, chunk);
        let auth = self.auth_header();
        // The client negotiates gzip itself (feature flag); the body
        // stream below always carries decoded bytes.
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 410 {
            // Withdrawn server-side; terminal for this message.
            return Err(MailboxError::MessageGone {
                message_id: message_id.to_string(),
            });
        }
        // 206 marks a non-final chunk and is a success here.
        if !status.is_success() {
            return Err(Self::status_error(status, &url));
        }

        let header_str = |name: &str| -> Option<String> {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let chunk_range = match header_str(MEX_CHUNK_RANGE) {
            Some(raw) => Some(
                raw.parse::<ChunkRange>()
                    .map_err(|e| MailboxError::MalformedResponse(e.to_string()))?,
            ),
            None => None,
        };
        let message_type = header_str(MEX_MESSAGE_TYPE)
            .map(|v| MessageType::from_header(&v))
            .unwrap_or_default();
        let filename = header_str(MEX_FILENAME).filter(|f| !f.is_empty());
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let meta = ChunkMeta {
            status: status.as_u16(),
            chunk_range,
            message_type,
            filename,
            headers,
        };
        debug!(
            mailbox = %self.mailbox,
            message_id = %message_id,
            chunk,
            range = ?meta.chunk_range,
            "chunk fetched"
        );
        let body = ChunkBody::from_stream(response.bytes_stream().map_err(Into::into));
        Ok(ChunkDownload { meta, body })
    }

    async fn acknowledge(&mut self, message_id: &str) -> Result<(), MailboxError> {
        let url = format!("{}/inbox/{message_id}/status/acknowledged", self.root);
        let auth = self.auth_header();
        let response = self
            .client
            .put(&url)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response.status(), &url));
        }
        info!(mailbox = %self.mailbox, message_id = %message_id, "message acknowledged");
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: SendChunk) -> Result<String, MailboxError> {
        let dest = self
            .dest_mailbox
            .clone()
            .ok_or(MailboxError::NoSendTarget)?;
        let workflow = self.workflow_id.clone().unwrap_or_default();

        let url = self.outbox_url(chunk.message_id.as_deref(), chunk.chunk);
        let auth = self.auth_header();
        let range = ChunkRange::new(chunk.chunk, chunk.total_chunks);

        let mut request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth)
            .header(MEX_FROM, &self.mailbox)
            .header(MEX_TO, &dest)
            .header(MEX_WORKFLOW_ID, &workflow)
            .header(MEX_FILENAME, &chunk.filename)
            .header(MEX_CHUNK_RANGE, range.to_string())
            .header(CONTENT_TYPE, "application/octet-stream");
        if chunk.compressed {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        let response = request
            .body(reqwest::Body::wrap_stream(chunk.body.into_stream()))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response.status(), &url));
        }
        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| MailboxError::MalformedResponse(e.to_string()))?;
        info!(
            mailbox = %self.mailbox,
            dest = %dest,
            message_id = %parsed.message_id,
            chunk = %range,
            "chunk sent"
        );
        Ok(parsed.message_id)
    }
}
