//! Transport adapter (spec §4.5): a plain `TcpStream` or a `rustls::StreamOwned` behind
//! one `write_all`/`read` surface, so the handshake and I/O loop never branch on TLS.
//!
//! Built on `rustls` 0.23's synchronous glue rather than `tokio-rustls`, since this
//! engine is thread-per-session, not async.

use crate::error::Error;
use crate::url::WsUrl;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Active connection, plain or TLS, behind one read/write surface (spec §4.5).
///
/// Carries an optional `leading` byte buffer: bytes already pulled off the wire during
/// the handshake (e.g. the server's first WebSocket frame coalesced into the same TCP
/// segment as its 101 response) that must be served before any further socket read, the
/// same way the teacher hands its handshake's `BufReader` straight to the frame reader
/// instead of discarding whatever it had already buffered.
pub enum Transport {
    Plain(TcpStream, Leading),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>, Leading),
}

/// Unconsumed bytes read off the wire before the caller started decoding frames.
#[derive(Default)]
pub struct Leading {
    buf: Vec<u8>,
    pos: usize,
}

impl Leading {
    fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let remaining = &self.buf[self.pos..];
        let n = remaining.len().min(dst.len());
        dst[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
        n
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

impl Transport {
    /// Prepends bytes already read off the wire (past the handshake's header
    /// terminator) so they're served before the next live socket read.
    pub fn push_leading_bytes(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        let leading = match self {
            Transport::Plain(_, l) => l,
            Transport::Tls(_, l) => l,
        };
        leading.buf = bytes;
        leading.pos = 0;
    }

    /// Opens the TCP socket, sets `TCP_NODELAY`, and connects within `connect_timeout`.
    pub fn connect_tcp(url: &WsUrl, connect_timeout: Duration) -> Result<TcpStream, Error> {
        let addr = url
            .socket_addr_str()
            .to_socket_addrs_first()
            .ok_or(Error::UrlNoHost)?;

        let stream = TcpStream::connect_timeout(&addr, connect_timeout)
            .map_err(|_| Error::ConnectTimeout(connect_timeout))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Wraps a connected `TcpStream` in a TLS session with SNI and hostname
    /// verification, pinned to a TLS 1.2 minimum, using `ca_file` as the trust anchor
    /// when given, otherwise the Mozilla bundle shipped by `webpki-roots`.
    pub fn connect_tls(
        tcp: TcpStream,
        host: &str,
        ca_file: Option<&Path>,
    ) -> Result<Transport, Error> {
        let mut roots = RootCertStore::empty();
        match ca_file {
            Some(path) => {
                let file = File::open(path)?;
                let mut reader = BufReader::new(file);
                for cert in rustls_pemfile::certs(&mut reader) {
                    let cert = cert?;
                    roots
                        .add(cert)
                        .map_err(|e| Error::TlsError(e.to_string()))?;
                }
            }
            None => {
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            }
        }

        let config = ClientConfig::builder_with_protocol_versions(&[
            &rustls::version::TLS12,
            &rustls::version::TLS13,
        ])
        .with_root_certificates(roots)
        .with_no_client_auth();

        let server_name = host.to_string().try_into()?;
        let conn = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| Error::TlsError(e.to_string()))?;

        Ok(Transport::Tls(
            Box::new(StreamOwned::new(conn, tcp)),
            Leading::default(),
        ))
    }

    /// Writes the whole buffer, looping until every byte lands or a fatal error
    /// surfaces. Never a short write from the caller's perspective.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        match self {
            Transport::Plain(s, _) => s.write_all(bytes)?,
            Transport::Tls(s, _) => s.write_all(bytes)?,
        }
        Ok(())
    }

    /// Reads into `dst`, returning the number of bytes read; `0` means EOF. Serves any
    /// leftover handshake bytes first, before touching the live socket.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize, Error> {
        let leading = match self {
            Transport::Plain(_, l) => l,
            Transport::Tls(_, l) => l,
        };
        if !leading.is_empty() {
            return Ok(leading.drain_into(dst));
        }
        let n = match self {
            Transport::Plain(s, _) => s.read(dst)?,
            Transport::Tls(s, _) => s.read(dst)?,
        };
        Ok(n)
    }

    /// Underlying socket, for setting read timeouts from the I/O loop's poll quantum.
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        match self {
            Transport::Plain(s, _) => s.set_read_timeout(dur),
            Transport::Tls(s, _) => s.sock.set_read_timeout(dur),
        }
    }

    pub fn shutdown(&self) {
        let sock = match self {
            Transport::Plain(s, _) => s,
            Transport::Tls(s, _) => &s.sock,
        };
        let _ = sock.shutdown(std::net::Shutdown::Both);
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let leading = match self {
            Transport::Plain(_, l) => l,
            Transport::Tls(_, l) => l,
        };
        if !leading.is_empty() {
            return Ok(leading.drain_into(buf));
        }
        match self {
            Transport::Plain(s, _) => s.read(buf),
            Transport::Tls(s, _) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(s, _) => s.write(buf),
            Transport::Tls(s, _) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(s, _) => s.flush(),
            Transport::Tls(s, _) => s.flush(),
        }
    }
}

/// Resolves `host:port` to a concrete socket address, preferring whichever family the
/// resolver returns first — the handshake doesn't care whether it lands on v4 or v6.
trait ResolveFirst {
    fn to_socket_addrs_first(&self) -> Option<std::net::SocketAddr>;
}

impl ResolveFirst for str {
    fn to_socket_addrs_first(&self) -> Option<std::net::SocketAddr> {
        use std::net::ToSocketAddrs;
        self.to_socket_addrs().ok()?.next()
    }
}
