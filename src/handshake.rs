//! Client-side connection sequence (spec §4.7): TCP connect, optional TLS, the literal
//! HTTP/1.1 Upgrade request, and response validation.

use crate::config::SessionConfig;
use crate::error::Error;
use crate::transport::{Leading, Transport};
use crate::url::WsUrl;
use crate::utils::{generate_websocket_accept_value, generate_websocket_key};
use bytes::BytesMut;

/// Result of a completed handshake: the live transport, with any bytes the server
/// already sent past the header terminator retained and served on the transport's
/// first subsequent reads (spec §4.7).
pub struct HandshakeOutcome {
    pub transport: Transport,
}

/// Runs the full connect sequence against `config.url`, returning a ready-to-use
/// transport with the HTTP Upgrade already negotiated.
pub fn connect(config: &SessionConfig) -> Result<HandshakeOutcome, Error> {
    let url = WsUrl::parse(&config.url)?;
    log::debug!("connecting to {}:{}", url.host, url.port);

    let tcp = Transport::connect_tcp(&url, config.connect_timeout)?;

    let mut transport = if url.secure {
        log::debug!("starting TLS handshake with {}", url.host);
        Transport::connect_tls(tcp, &url.host, config.ca_file.as_deref())?
    } else {
        Transport::Plain(tcp, Leading::default())
    };

    let key = generate_websocket_key();
    let request = build_request(&url, &key);
    transport.write_all(request.as_bytes())?;

    let response = read_http_response(&mut transport)?;
    let header_len = validate_response(&response, &key)?;

    // A server may coalesce its first WebSocket frame into the same TCP segment as the
    // 101 response; anything read past the header terminator belongs to the frame
    // decoder, not the handshake, so it's handed back to the transport instead of
    // dropped with the rest of `response`.
    if header_len < response.len() {
        transport.push_leading_bytes(response[header_len..].to_vec());
    }

    log::debug!("handshake with {} completed", url.host);
    Ok(HandshakeOutcome { transport })
}

/// Builds the literal HTTP/1.1 Upgrade request bytes from spec §6.
fn build_request(url: &WsUrl, key: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        path = url.path,
        host = url.host_header(),
        key = key,
    )
}

/// Reads bytes from `transport` until a full HTTP header block (terminated by
/// `\r\n\r\n`) has arrived, then hands it to `httparse`.
fn read_http_response(transport: &mut Transport) -> Result<BytesMut, Error> {
    let mut buf = BytesMut::with_capacity(1024);
    let mut chunk = [0u8; 512];
    loop {
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(buf);
        }
        let n = transport.read(&mut chunk)?;
        if n == 0 {
            return Err(Error::IncompleteHttpResponse);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > 16 * 1024 {
            return Err(Error::IncompleteHttpResponse);
        }
    }
}

/// Validates a raw HTTP handshake response against the key sent in the request,
/// returning the number of bytes `httparse` consumed parsing the status line and
/// headers so the caller can recover any trailing bytes read past them. Re-exported
/// at crate level as `validate_handshake_response` so the fuzz harness can drive it
/// directly without a live socket.
pub(crate) fn validate_response(raw: &[u8], key: &str) -> Result<usize, Error> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers);
    let header_len = match response.parse(raw)? {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Err(Error::IncompleteHttpResponse),
    };

    if response.code != Some(101) {
        return Err(Error::NoUpgrade);
    }

    let upgrade_present = response.headers.iter().any(|h| {
        h.name.eq_ignore_ascii_case("upgrade")
            && String::from_utf8_lossy(h.value).eq_ignore_ascii_case("websocket")
    });
    if !upgrade_present {
        return Err(Error::NoUpgradeHeaderPresent);
    }

    let accept = response
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("sec-websocket-accept"))
        .map(|h| String::from_utf8_lossy(h.value).to_string());

    match accept {
        Some(accept) if accept == generate_websocket_accept_value(key) => Ok(header_len),
        _ => Err(Error::InvalidAcceptKey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_uses_literal_upgrade_shape() {
        let url = WsUrl::parse("ws://example.com/stream").unwrap();
        let req = build_request(&url, "dGhlIHNhbXBsZSBub25jZQ==");
        assert!(req.starts_with("GET /stream HTTP/1.1\r\n"));
        assert!(req.contains("Host: example.com\r\n"));
        assert!(req.contains("Upgrade: websocket\r\n"));
        assert!(req.contains("Connection: Upgrade\r\n"));
        assert!(req.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(req.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(req.ends_with("\r\n\r\n"));
    }

    #[test]
    fn build_request_includes_nondefault_port_in_host() {
        let url = WsUrl::parse("wss://example.com:9443/").unwrap();
        let req = build_request(&url, "key");
        assert!(req.contains("Host: example.com:9443\r\n"));
    }

    #[test]
    fn validate_response_accepts_matching_accept_value() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let accept = generate_websocket_accept_value(key);
        let raw = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {accept}\r\n\
             \r\n"
        );
        assert!(validate_response(raw.as_bytes(), key).is_ok());
    }

    #[test]
    fn validate_response_reports_header_len_excluding_coalesced_frame_bytes() {
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let accept = generate_websocket_accept_value(key);
        let headers = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {accept}\r\n\
             \r\n"
        );
        let first_frame = [0x81u8, 0x05, b'h', b'e', b'l', b'l', b'o'];
        let mut raw = headers.clone().into_bytes();
        raw.extend_from_slice(&first_frame);

        let header_len = validate_response(&raw, key).unwrap();
        assert_eq!(header_len, headers.len());
        assert_eq!(&raw[header_len..], &first_frame[..]);
    }

    #[test]
    fn validate_response_rejects_non_101_status() {
        let raw = b"HTTP/1.1 404 Not Found\r\n\r\n";
        let err = validate_response(raw, "key").unwrap_err();
        assert!(matches!(err, Error::NoUpgrade));
    }

    #[test]
    fn validate_response_rejects_missing_upgrade_header() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\n\r\n";
        let err = validate_response(raw, "key").unwrap_err();
        assert!(matches!(err, Error::NoUpgradeHeaderPresent));
    }

    #[test]
    fn validate_response_rejects_wrong_accept_value() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nSec-WebSocket-Accept: bogus==\r\n\r\n";
        let err = validate_response(raw, "dGhlIHNhbXBsZSBub25jZQ==").unwrap_err();
        assert!(matches!(err, Error::InvalidAcceptKey));
    }
}
