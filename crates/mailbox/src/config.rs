use serde::Deserialize;

use crate::MailboxError;

/// Per-mailbox and shared configuration, immutable for a session's
/// lifetime. How this is loaded (parameter store, environment, ...) is the
/// invoking host's concern; the crate only defines the shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailboxConfig {
    /// Server base URL, e.g. `https://mesh.example.nhs.uk`.
    pub base_url: String,
    /// Shared secret keying the HMAC authorization token.
    pub shared_key: String,
    /// Mailbox password, part of the HMAC message.
    pub password: String,
    /// Client certificate (PEM), paired with `client_key_pem`.
    #[serde(default)]
    pub client_cert_pem: Option<String>,
    #[serde(default)]
    pub client_key_pem: Option<String>,
    /// Extra root CA (PEM) for private server certificates.
    #[serde(default)]
    pub ca_cert_pem: Option<String>,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    /// Bucket receiving inbound messages.
    pub inbound_bucket: String,
    /// Key prefix within the inbound bucket.
    #[serde(default)]
    pub inbound_folder: String,
}

fn default_true() -> bool {
    true
}

impl MailboxConfig {
    pub fn from_json(json: &str) -> Result<Self, MailboxError> {
        serde_json::from_str(json).map_err(|e| MailboxError::MalformedConfig(e.to_string()))
    }

    /// Destination key for an inbound file, under the configured folder.
    pub fn inbound_key(&self, filename: &str) -> String {
        let folder = self.inbound_folder.trim_matches('/');
        if folder.is_empty() {
            filename.to_string()
        } else {
            format!("{folder}/{filename}")
        }
    }
}
