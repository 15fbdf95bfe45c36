use pki_types::InvalidDnsNameError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

/// Stable numeric/symbolic failure taxonomy from the failure-handling design: setup
/// errors prevent reaching `Open`, transport/protocol errors tear an `Open` connection
/// down, liveness errors may trigger reconnection. Kept separate from `Error` itself so
/// callers can match on it without string comparison. `#[non_exhaustive]` because the
/// spec calls this list non-exhaustive.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    ConnectionFailed,
    TlsError,
    HandshakeFailed,
    Timeout,
    SendFailed,
    ReceiveFailed,
    InvalidFrame,
    MessageTooLarge,
    PingTimeout,
    Disconnected,
    InvalidConfig,
}

#[derive(Error, Debug)]
pub enum Error {
    // URL errors
    #[error("invalid scheme in WebSocket URL, expected ws:// or wss://")]
    InvalidSchemeUrl,

    #[error("WebSocket URL has no host")]
    UrlNoHost,

    #[error("WebSocket URL port `{0}` is not a valid 1..65535 port number")]
    UrlInvalidPort(String),

    // Connection / handshake errors
    #[error("{source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    DomainError {
        #[from]
        source: InvalidDnsNameError,
    },

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("server didn't upgrade the connection (no HTTP 101 response)")]
    NoUpgrade,

    #[error("Upgrade: websocket header missing from the handshake response")]
    NoUpgradeHeaderPresent,

    #[error("server sent an invalid Sec-WebSocket-Accept value")]
    InvalidAcceptKey,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: httparse::Error,
    },

    #[error("incomplete HTTP response during handshake")]
    IncompleteHttpResponse,

    // Framing errors
    #[error("reserved bits set with no extension negotiated")]
    RsvNotZero,

    #[error("control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("control frame payload exceeds 125 bytes")]
    ControlFramePayloadSize,

    #[error("invalid opcode {0:#x}")]
    InvalidOpcode(u8),

    #[error("message of {size} bytes exceeds the configured maximum of {max} bytes")]
    MessageTooLarge { size: u64, max: u64 },

    // Fragmentation errors
    #[error("invalid frame received while a fragmented message is in progress")]
    InvalidFrameFragmentation,

    #[error("incoming fragmented message but one is already in progress")]
    FragmentedInProgress,

    #[error("continuation frame received with no fragmented message in progress")]
    InvalidContinuationFrame,

    #[error("invalid UTF-8 text payload: {source}")]
    InvalidUtf8 {
        #[from]
        source: FromUtf8Error,
    },

    // Send-path / liveness errors
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    #[error("failed to receive frame: {0}")]
    ReceiveFailed(String),

    #[error("peer did not answer a ping within the configured pong deadline")]
    PingTimeout,

    #[error("connection is closed")]
    Disconnected,

    #[error("core index {0} is not a valid CPU core on this host")]
    InvalidCoreIndex(usize),
}

impl Error {
    /// Maps a concrete error variant onto the numeric taxonomy from §4.10 / §7, for
    /// callers that want to branch on category rather than match every variant.
    pub fn code(&self) -> ErrorCode {
        use Error::*;
        match self {
            InvalidSchemeUrl | UrlNoHost | UrlInvalidPort(_) => ErrorCode::InvalidUrl,
            IOError { .. } => ErrorCode::ConnectionFailed,
            DomainError { .. } => ErrorCode::ConnectionFailed,
            TlsError(_) => ErrorCode::TlsError,
            ConnectTimeout(_) => ErrorCode::Timeout,
            NoUpgrade | NoUpgradeHeaderPresent | InvalidAcceptKey | HttpParseError { .. }
            | IncompleteHttpResponse => ErrorCode::HandshakeFailed,
            RsvNotZero
            | ControlFramesFragmented
            | ControlFramePayloadSize
            | InvalidOpcode(_)
            | InvalidFrameFragmentation
            | FragmentedInProgress
            | InvalidContinuationFrame
            | InvalidUtf8 { .. } => ErrorCode::InvalidFrame,
            MessageTooLarge { .. } => ErrorCode::MessageTooLarge,
            SendFailed(_) => ErrorCode::SendFailed,
            ReceiveFailed(_) => ErrorCode::ReceiveFailed,
            PingTimeout => ErrorCode::PingTimeout,
            Disconnected => ErrorCode::Disconnected,
            InvalidCoreIndex(_) => ErrorCode::InvalidConfig,
        }
    }

    /// Close code to send/report when this error tears down an `Open` connection,
    /// per §7: protocol errors close with 1002 (ProtocolError) or 1009
    /// (MessageTooBig); everything else has no specific code of its own and falls
    /// back to whatever the transport/EOF path already determined.
    pub fn protocol_close_code(&self) -> Option<u16> {
        match self.code() {
            ErrorCode::MessageTooLarge => Some(crate::state::close_code::MESSAGE_TOO_BIG),
            ErrorCode::InvalidFrame => Some(crate::state::close_code::PROTOCOL_ERROR),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
