//! Connection state machine (spec §4.9) and RFC 6455 close codes (spec §4.10).

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
    Closed = 4,
    Reconnecting = 5,
}

impl ConnState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnState::Idle,
            1 => ConnState::Connecting,
            2 => ConnState::Open,
            3 => ConnState::Closing,
            4 => ConnState::Closed,
            5 => ConnState::Reconnecting,
            other => unreachable!("invalid encoded connection state {other}"),
        }
    }
}

/// Atomic holder for the session's connection state, shared between the I/O thread,
/// the reconnection controller, and any thread calling `isConnected()`.
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(initial: ConnState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> ConnState {
        ConnState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ConnState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(ConnState::Idle)
    }
}

/// RFC 6455 §7.4.1 status codes used by this engine (spec §4.10).
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const NO_STATUS_RECEIVED: u16 = 1005;
    pub const ABNORMAL_CLOSURE: u16 = 1006;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const MESSAGE_TOO_BIG: u16 = 1009;
    pub const INTERNAL_ERROR: u16 = 1011;
}

/// Whether `code` represents a normal, user-initiated closure — used to decide
/// whether a closed session should attempt to reconnect (spec §4.9).
pub fn is_abnormal_close(code: Option<u16>) -> bool {
    !matches!(code, Some(close_code::NORMAL) | Some(close_code::GOING_AWAY))
}
