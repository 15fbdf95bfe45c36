//! A thread-per-session RFC 6455 WebSocket client runtime for high-throughput,
//! long-lived streaming connections (market data, event buses, telemetry).
//!
//! [`Session`] opens a TCP or TLS connection, performs the HTTP Upgrade handshake,
//! and then exchanges masked WebSocket frames on a dedicated I/O thread. A second
//! thread maintains liveness with a configurable ping/pong heartbeat; any number of
//! producer threads may call the synchronous or asynchronous send methods
//! concurrently. An abnormal disconnect triggers an exponential-ish linear backoff
//! and automatic re-handshake, bounded by a configured attempt count.
//!
//! ```no_run
//! use wavecore::{Session, SessionConfig};
//!
//! let session = Session::new(SessionConfig::new("wss://echo.example/"));
//! session.on_message(|msg| println!("received {msg:?}"));
//! session.connect();
//! session.send("hello").unwrap();
//! session.wait();
//! ```

mod callbacks;
pub mod config;
pub mod error;
pub mod frame;
mod handshake;
mod heartbeat;
mod io_loop;
pub mod message;
mod pool;
mod queue;
mod reconnect;
mod session;
pub mod state;
mod transport;
mod utils;
pub mod url;

pub use config::{HeartbeatConfig, PingMode, SessionConfig};
pub use error::{Error, ErrorCode, Result};
pub use frame::OpCode;
pub use message::Message;
pub use pool::{BufferPool, PooledBuffer};
pub use queue::{OutboundItem, SendQueue};
pub use session::Session;
pub use state::{close_code, ConnState};
pub use url::WsUrl;

/// Validates a raw HTTP handshake response against the `Sec-WebSocket-Key` sent in
/// the request (spec §4.7). Exposed standalone, outside the private `handshake`
/// module, so it can be driven directly by the fuzz harness without a live socket.
pub fn validate_handshake_response(raw: &[u8], key: &str) -> Result<()> {
    handshake::validate_response(raw, key).map(|_header_len| ())
}
