//! Handshake key/accept helpers (RFC 6455 §1.3).

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::random;
use sha1::{Digest, Sha1};

pub(crate) const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` value a server should echo back for `key`.
pub(crate) fn generate_websocket_accept_value(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// Generates a fresh 16-byte random nonce, base64-encoded, for `Sec-WebSocket-Key`.
pub(crate) fn generate_websocket_key() -> String {
    let random_bytes: [u8; 16] = random();
    BASE64_STANDARD.encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_value_matches_known_rfc_example() {
        // RFC 6455 §1.3 worked example.
        let accept = generate_websocket_accept_value("dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn key_is_16_bytes_base64_encoded() {
        let key = generate_websocket_key();
        let decoded = base64::prelude::BASE64_STANDARD.decode(key).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn successive_keys_differ() {
        assert_ne!(generate_websocket_key(), generate_websocket_key());
    }
}
