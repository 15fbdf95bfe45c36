//! Demonstrates the heartbeat engine: a short ping interval and pong deadline so
//! `onPong`/`onError(PingTimeout)` are observable within seconds against a live peer.

use std::time::Duration;
use wavecore::{PingMode, Session, SessionConfig};

fn main() {
    env_logger::init();

    let mut config = SessionConfig::new("ws://127.0.0.1:9002");
    config.heartbeat.mode = PingMode::ControlPing;
    config.heartbeat.interval = Duration::from_secs(1);
    config.heartbeat.timeout = Duration::from_secs(5);
    let session = Session::new(config);

    session.on_connect(|| println!("connected"));
    session.on_pong(|payload| println!("pong received, {} bytes", payload.len()));
    session.on_error(|code, message| eprintln!("error {code:?}: {message}"));
    session.on_disconnect(|code| println!("disconnected, code={code:?}"));

    session.connect();
    std::thread::sleep(Duration::from_secs(30));

    session.disconnect(wavecore::close_code::NORMAL);
    session.wait();
}
