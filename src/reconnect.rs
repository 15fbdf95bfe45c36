//! Reconnection controller (spec §4.9 `Closed → Reconnecting → Connecting`, §7).
//!
//! Pure decision/backoff helpers; the actual retry loop lives in `session.rs`, which
//! owns the thread that calls back into `handshake::connect` and `io_loop::run`.

use crate::config::SessionConfig;
use std::time::Duration;

/// Attempt `N` (1-indexed) waits `N` seconds before retrying.
pub fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(attempt as u64)
}

/// Whether the session should attempt another reconnect after this exit.
///
/// `user_initiated` distinguishes a caller-requested `disconnect()` from the loop
/// exiting on its own (EOF, socket error, or a received Close frame with a normal
/// code), since the state machine only reconnects after an abnormal exit.
pub fn should_reconnect(
    config: &SessionConfig,
    attempts_so_far: u32,
    abnormal: bool,
    user_initiated: bool,
) -> bool {
    config.auto_reconnect
        && !user_initiated
        && abnormal
        && attempts_so_far < config.max_reconnect_attempts
}
