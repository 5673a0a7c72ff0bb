//! HMAC authorization tokens for the message-exchange server.
//!
//! The server authenticates every request with a shared-secret HMAC over
//! `mailbox:nonce:counter:password:timestamp`. Token construction is pure
//! so it can be verified against known vectors without network access.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Authorization scheme prefix.
pub const AUTH_SCHEME: &str = "NHSMESH";

/// Formats a timestamp at the minute resolution the server expects.
pub fn auth_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M").to_string()
}

/// Builds the `Authorization` header value.
///
/// The digest is HMAC-SHA256 over the colon-joined
/// `mailbox:nonce:counter:password:timestamp`, keyed by the shared secret
/// and hex-encoded.
pub fn authorization_header(
    mailbox: &str,
    password: &str,
    shared_key: &str,
    nonce: &str,
    nonce_count: u64,
    timestamp: &str,
) -> String {
    let message = format!("{mailbox}:{nonce}:{nonce_count}:{password}:{timestamp}");
    let mut mac = HmacSha256::new_from_slice(shared_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    let digest = hex::encode(mac.finalize().into_bytes());
    format!("{AUTH_SCHEME} {mailbox}:{nonce}:{nonce_count}:{timestamp}:{digest}")
}

/// Per-session authorization state.
///
/// Mints a fresh nonce for every request and keeps the monotonic counter
/// the server uses for replay detection. One instance per session; the
/// counter starts at 0.
#[derive(Debug, Default)]
pub struct AuthState {
    counter: u64,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces the next `Authorization` header value and advances the counter.
    pub fn next_header(&mut self, mailbox: &str, password: &str, shared_key: &str) -> String {
        let nonce = Uuid::new_v4().to_string();
        let timestamp = auth_timestamp(Utc::now());
        let header = authorization_header(
            mailbox,
            password,
            shared_key,
            &nonce,
            self.counter,
            &timestamp,
        );
        self.counter += 1;
        header
    }

    /// Current counter value (requests issued so far).
    pub fn counter(&self) -> u64 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const MAILBOX: &str = "MESH-UI-02";
    const PASSWORD: &str = "password";
    const KEY: &str = "BackBone";
    const NONCE: &str = "c4e8e7ce-8d78-4ec4-a5ab-0b4a1bc1f478";

    #[test]
    fn header_is_deterministic() {
        let a = authorization_header(MAILBOX, PASSWORD, KEY, NONCE, 0, "202608301200");
        let b = authorization_header(MAILBOX, PASSWORD, KEY, NONCE, 0, "202608301200");
        assert_eq!(a, b);
        assert!(a.starts_with("NHSMESH MESH-UI-02:"));
    }

    #[test]
    fn header_embeds_nonce_counter_timestamp() {
        let h = authorization_header(MAILBOX, PASSWORD, KEY, NONCE, 7, "202608301200");
        let rest = h.strip_prefix("NHSMESH ").unwrap();
        let parts: Vec<&str> = rest.split(':').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], MAILBOX);
        assert_eq!(parts[1], NONCE);
        assert_eq!(parts[2], "7");
        assert_eq!(parts[3], "202608301200");
        assert_eq!(parts[4].len(), 64); // SHA-256 = 64 hex chars.
    }

    #[test]
    fn changing_any_input_changes_digest() {
        let digest = |m: &str, p: &str, k: &str, n: &str, c: u64, t: &str| {
            authorization_header(m, p, k, n, c, t)
                .rsplit(':')
                .next()
                .unwrap()
                .to_string()
        };
        let base = digest(MAILBOX, PASSWORD, KEY, NONCE, 0, "202608301200");
        assert_ne!(base, digest("OTHER", PASSWORD, KEY, NONCE, 0, "202608301200"));
        assert_ne!(base, digest(MAILBOX, "other", KEY, NONCE, 0, "202608301200"));
        assert_ne!(base, digest(MAILBOX, PASSWORD, "other", NONCE, 0, "202608301200"));
        assert_ne!(base, digest(MAILBOX, PASSWORD, KEY, "other-nonce", 0, "202608301200"));
        assert_ne!(base, digest(MAILBOX, PASSWORD, KEY, NONCE, 1, "202608301200"));
        assert_ne!(base, digest(MAILBOX, PASSWORD, KEY, NONCE, 0, "202608301201"));
    }

    #[test]
    fn timestamp_is_minute_resolution() {
        let at = Utc.with_ymd_and_hms(2026, 8, 30, 12, 34, 56).unwrap();
        assert_eq!(auth_timestamp(at), "202608301234");
    }

    #[test]
    fn auth_state_counter_advances() {
        let mut auth = AuthState::new();
        assert_eq!(auth.counter(), 0);
        let h0 = auth.next_header(MAILBOX, PASSWORD, KEY);
        let h1 = auth.next_header(MAILBOX, PASSWORD, KEY);
        assert_eq!(auth.counter(), 2);
        // Fresh nonce per request means the headers never repeat.
        assert_ne!(h0, h1);
        assert!(h1.contains(":1:"));
    }
}
