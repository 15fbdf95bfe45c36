//! Session/heartbeat configuration (spec §6), with `Default` impls matching the
//! documented defaults exactly.

use std::path::PathBuf;
use std::time::Duration;

/// Heartbeat behavior, per §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingMode {
    Disabled,
    /// WebSocket opcode 0x9 control ping.
    ControlPing,
    /// A configured text message sent as an opcode 0x1 frame.
    TextPing,
}

impl Default for PingMode {
    fn default() -> Self {
        PingMode::ControlPing
    }
}

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub mode: PingMode,
    pub interval: Duration,
    pub timeout: Duration,
    pub text_message: String,
    pub auto_pong: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        HeartbeatConfig {
            mode: PingMode::default(),
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
            text_message: "ping".to_string(),
            auto_pong: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub max_message_size: u64,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub heartbeat: HeartbeatConfig,
    /// PEM file of trust anchors; `None` uses the bundled `webpki-roots` trust store.
    pub ca_file: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        SessionConfig {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            max_message_size: 16 * 1024 * 1024,
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            heartbeat: HeartbeatConfig::default(),
            ca_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults_match_documented_values() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_message_size, 16 * 1024 * 1024);
        assert!(cfg.auto_reconnect);
        assert_eq!(cfg.max_reconnect_attempts, 5);
        assert!(cfg.ca_file.is_none());
    }

    #[test]
    fn heartbeat_defaults_match_documented_values() {
        let hb = HeartbeatConfig::default();
        assert_eq!(hb.mode, PingMode::ControlPing);
        assert_eq!(hb.interval, Duration::from_secs(30));
        assert_eq!(hb.timeout, Duration::from_secs(10));
        assert_eq!(hb.text_message, "ping");
        assert!(hb.auto_pong);
    }

    #[test]
    fn new_sets_url_and_keeps_other_defaults() {
        let cfg = SessionConfig::new("ws://example.com");
        assert_eq!(cfg.url, "ws://example.com");
        assert_eq!(cfg.max_reconnect_attempts, 5);
    }
}
