//! Same as `echo_client`, but over TLS with a custom trust anchor.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wavecore::{Session, SessionConfig};

fn generate_random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

fn main() {
    env_logger::init();

    let mut config = SessionConfig::new("wss://localhost:9002");
    config.ca_file = Some(PathBuf::from("ca.crt"));
    let session = Session::new(config);

    let received = Arc::new(AtomicUsize::new(0));
    let received_clone = Arc::clone(&received);
    session.on_message(move |msg| {
        log::info!("received message: {msg:?}");
        received_clone.fetch_add(1, Ordering::SeqCst);
    });
    session.on_error(|code, message| log::error!("error {code:?}: {message}"));

    session.connect();

    loop {
        std::thread::sleep(Duration::from_secs(5));
        if received.load(Ordering::SeqCst) >= 3 {
            break;
        }
        if session.send(&generate_random_string()).is_err() {
            log::error!("failed to send message");
            break;
        }
    }

    session.disconnect(wavecore::close_code::NORMAL);
    session.wait();
}
