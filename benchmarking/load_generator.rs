//! Spins up many concurrent sessions against a local echo peer and reports average
//! round-trip latency. Not wired into the workspace as a `[[bin]]` (same as the
//! teacher's own `benchmarking/load_generator.rs`); run it by hand, e.g.
//! `rustc --edition 2021 -L target/debug/deps --extern wavecore=target/debug/libwavecore.rlib benchmarking/load_generator.rs`.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wavecore::{Session, SessionConfig};

fn main() {
    let url = "ws://127.0.0.1:9002";
    let connection_count = 100;
    let message_count = 1000;
    let message_size = 16384;

    let (tx, rx) = mpsc::channel();

    let sessions: Vec<_> = (0..connection_count)
        .map(|_| {
            let tx = tx.clone();
            let session = Session::new(SessionConfig::new(url));
            let (reply_tx, reply_rx) = mpsc::channel::<()>();
            session.on_message(move |_msg| {
                let _ = reply_tx.send(());
            });
            session.connect();
            (session, reply_rx, tx)
        })
        .collect();
    drop(tx);

    let handles: Vec<_> = sessions
        .into_iter()
        .map(|(session, reply_rx, tx)| {
            std::thread::spawn(move || {
                let session = Arc::new(session);
                let payload = "a".repeat(message_size);

                // Wait for the handshake to land before timing the send/receive loop.
                while !session.is_connected() {
                    std::thread::sleep(Duration::from_millis(10));
                }

                let start = Instant::now();
                for _ in 0..message_count {
                    session.send(&payload).expect("send failed");
                    reply_rx.recv_timeout(Duration::from_secs(5)).expect("no reply");
                }
                let elapsed = start.elapsed();

                tx.send(elapsed).unwrap();
                session.disconnect(wavecore::close_code::NORMAL);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut total = Duration::new(0, 0);
    let mut count = 0u32;
    while let Ok(elapsed) = rx.recv() {
        total += elapsed;
        count += 1;
    }

    let avg_latency = total / (count * message_count as u32);
    println!("Average Latency: {:?}", avg_latency);
}
