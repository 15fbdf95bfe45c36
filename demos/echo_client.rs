//! Connects to a plaintext echo server, sends a few messages on a timer, and
//! disconnects once it has seen three replies.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
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

    let session = Session::new(SessionConfig::new("ws://127.0.0.1:9002"));

    let received = Arc::new(AtomicUsize::new(0));
    let received_clone = Arc::clone(&received);
    session.on_message(move |msg| {
        println!("received message: {msg:?}");
        received_clone.fetch_add(1, Ordering::SeqCst);
    });
    session.on_error(|code, message| eprintln!("error {code:?}: {message}"));
    session.on_disconnect(|code| println!("disconnected, code={code:?}"));

    session.connect();

    loop {
        std::thread::sleep(Duration::from_secs(5));
        if received.load(Ordering::SeqCst) >= 3 {
            break;
        }
        if session.send(&generate_random_string()).is_err() {
            eprintln!("failed to send message");
            break;
        }
    }

    session.disconnect(wavecore::close_code::NORMAL);
    session.wait();
}
