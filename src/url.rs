//! Minimal `ws://` / `wss://` URL parsing (spec §4.1).
//!
//! Deliberately narrow: two schemes, an optional `:port`, a path defaulting to `/`.
//! A general-purpose URL crate would happily parse far more than this protocol needs,
//! which is exactly why this module exists instead of depending on one.

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUrl {
    pub secure: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl WsUrl {
    pub fn parse(input: &str) -> Result<WsUrl, Error> {
        if !input.is_ascii() {
            return Err(Error::InvalidSchemeUrl);
        }

        let (secure, default_port, rest) = if let Some(rest) = input.strip_prefix("wss://") {
            (true, 443u16, rest)
        } else if let Some(rest) = input.strip_prefix("ws://") {
            (false, 80u16, rest)
        } else {
            return Err(Error::InvalidSchemeUrl);
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        if authority.is_empty() {
            return Err(Error::UrlNoHost);
        }

        let (host, port) = split_authority(authority, default_port)?;

        if host.is_empty() {
            return Err(Error::UrlNoHost);
        }

        Ok(WsUrl {
            secure,
            host,
            port,
            path: path.to_string(),
        })
    }

    /// `Host:` header value: includes the port only when it differs from the
    /// scheme's default, matching the literal handshake request in spec §6.
    pub fn host_header(&self) -> String {
        let default_port = if self.secure { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Host:port pair suitable for `TcpStream::connect`/DNS resolution.
    pub fn socket_addr_str(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Splits `host[:port]`, with optional bracketed IPv6 literal support
/// (`[::1]:9000`) — not required by the base spec but explicitly allowed.
fn split_authority(authority: &str, default_port: u16) -> Result<(String, u16), Error> {
    if let Some(rest) = authority.strip_prefix('[') {
        let close = rest.find(']').ok_or(Error::UrlNoHost)?;
        let host = &rest[..close];
        let after = &rest[close + 1..];
        let port = match after.strip_prefix(':') {
            Some(port_str) => parse_port(port_str)?,
            None => default_port,
        };
        return Ok((host.to_string(), port));
    }

    match authority.rsplit_once(':') {
        Some((host, port_str)) => Ok((host.to_string(), parse_port(port_str)?)),
        None => Ok((authority.to_string(), default_port)),
    }
}

fn parse_port(port_str: &str) -> Result<u16, Error> {
    port_str
        .parse::<u16>()
        .ok()
        .filter(|&p| p != 0)
        .ok_or_else(|| Error::UrlInvalidPort(port_str.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_ws_with_default_port() {
        let url = WsUrl::parse("ws://example.com/stream").unwrap();
        assert!(!url.secure);
        assert_eq!(url.host, "example.com");
        assert_eq!(url.port, 80);
        assert_eq!(url.path, "/stream");
        assert_eq!(url.host_header(), "example.com");
    }

    #[test]
    fn parses_secure_wss_with_explicit_port() {
        let url = WsUrl::parse("wss://echo.example:9443/v1/feed").unwrap();
        assert!(url.secure);
        assert_eq!(url.host, "echo.example");
        assert_eq!(url.port, 9443);
        assert_eq!(url.path, "/v1/feed");
        assert_eq!(url.host_header(), "echo.example:9443");
    }

    #[test]
    fn defaults_missing_path_to_root() {
        let url = WsUrl::parse("ws://example.com").unwrap();
        assert_eq!(url.path, "/");
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(matches!(
            WsUrl::parse("http://example.com"),
            Err(Error::InvalidSchemeUrl)
        ));
    }

    #[test]
    fn rejects_missing_host() {
        assert!(matches!(WsUrl::parse("ws:///path"), Err(Error::UrlNoHost)));
    }

    #[test]
    fn rejects_zero_port() {
        assert!(matches!(
            WsUrl::parse("ws://example.com:0/"),
            Err(Error::UrlInvalidPort(_))
        ));
    }

    #[test]
    fn supports_bracketed_ipv6() {
        let url = WsUrl::parse("ws://[::1]:9000/x").unwrap();
        assert_eq!(url.host, "::1");
        assert_eq!(url.port, 9000);
    }

    #[test]
    fn ipv6_without_port_uses_default() {
        let url = WsUrl::parse("wss://[2001:db8::1]/").unwrap();
        assert_eq!(url.host, "2001:db8::1");
        assert_eq!(url.port, 443);
    }
}
