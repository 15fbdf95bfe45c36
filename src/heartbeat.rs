//! Heartbeat engine (spec §4.6): a dedicated worker thread that pings on an interval,
//! watches for a pong deadline, and auto-pongs incoming pings.

use crate::config::{HeartbeatConfig, PingMode};
use crate::queue::{OutboundItem, SendQueue};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct Shared {
    config: Mutex<HeartbeatConfig>,
    stopped: Mutex<bool>,
    outstanding: Mutex<Option<Instant>>,
    last_pong: Mutex<Option<Instant>>,
    timed_out: Mutex<bool>,
    cv: Condvar,
}

/// Runs the heartbeat worker thread and exposes its runtime mutators (spec §4.6).
/// The join handle sits behind its own mutex (rather than requiring `&mut self`) so
/// the session facade can hold this behind an `Arc` and still call `stop()`.
pub struct Heartbeat {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    /// Spawns the worker. `send_queue` is where pings (and auto-pongs) are enqueued as
    /// frames get encoded by the I/O loop's outbound path; `on_timeout` fires when a
    /// ping goes unanswered past the configured pong deadline.
    pub fn spawn<F>(config: HeartbeatConfig, send_queue: Arc<SendQueue>, on_timeout: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            config: Mutex::new(config),
            stopped: Mutex::new(false),
            outstanding: Mutex::new(None),
            last_pong: Mutex::new(None),
            timed_out: Mutex::new(false),
            cv: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            heartbeat_loop(worker_shared, send_queue, on_timeout);
        });

        Heartbeat {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn set_mode(&self, mode: PingMode) {
        self.shared.config.lock().unwrap().mode = mode;
        if mode == PingMode::Disabled {
            *self.shared.stopped.lock().unwrap() = true;
        }
        self.shared.cv.notify_all();
    }

    pub fn set_interval(&self, interval: Duration) {
        self.shared.config.lock().unwrap().interval = interval;
        self.shared.cv.notify_all();
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.shared.config.lock().unwrap().timeout = timeout;
        self.shared.cv.notify_all();
    }

    pub fn set_auto_pong(&self, enabled: bool) {
        self.shared.config.lock().unwrap().auto_pong = enabled;
    }

    pub fn auto_pong_enabled(&self) -> bool {
        self.shared.config.lock().unwrap().auto_pong
    }

    /// Called by the I/O loop whenever a Pong frame arrives.
    pub fn record_pong(&self) {
        *self.shared.outstanding.lock().unwrap() = None;
        *self.shared.last_pong.lock().unwrap() = Some(Instant::now());
    }

    pub fn timed_out(&self) -> bool {
        *self.shared.timed_out.lock().unwrap()
    }

    /// Stops the worker and blocks until it exits. Idempotent.
    pub fn stop(&self) {
        *self.shared.stopped.lock().unwrap() = true;
        self.shared.cv.notify_all();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

fn heartbeat_loop<F: Fn() + Send + 'static>(
    shared: Arc<Shared>,
    send_queue: Arc<SendQueue>,
    on_timeout: F,
) {
    loop {
        let interval = shared.config.lock().unwrap().interval;

        let guard = shared.stopped.lock().unwrap();
        let (guard, timeout_result) = shared.cv.wait_timeout(guard, interval).unwrap();
        if *guard {
            return;
        }
        drop(guard);
        let _ = timeout_result;

        let config = shared.config.lock().unwrap().clone();
        if config.mode == PingMode::Disabled {
            continue;
        }

        let mut outstanding = shared.outstanding.lock().unwrap();
        if let Some(sent_at) = *outstanding {
            if sent_at.elapsed() > config.timeout {
                *shared.timed_out.lock().unwrap() = true;
                *outstanding = None;
                drop(outstanding);
                on_timeout();
                continue;
            }
            // A ping is already outstanding and not yet overdue; wait another cycle.
            continue;
        }

        let item = match config.mode {
            PingMode::ControlPing => OutboundItem::Ping(Vec::new()),
            PingMode::TextPing => OutboundItem::Text(config.text_message.clone().into_bytes()),
            PingMode::Disabled => unreachable!(),
        };
        send_queue.push(item);
        *outstanding = Some(Instant::now());
    }
}
