//! Public session facade (spec §6, §9 "Pimpl / hidden state").
//!
//! `Session` is a thin `Arc` handle over [`SessionInner`]; cloning or moving it never
//! touches the controller thread it may have spawned. The controller thread owns the
//! connect → handshake → I/O-loop → reconnect sequence end to end, which is also how
//! it doubles as "the" I/O thread the spec describes (there is never more than one
//! per session, per §3's invariant).

use crate::callbacks::Callbacks;
use crate::config::{PingMode, SessionConfig};
use crate::error::{Error, ErrorCode};
use crate::frame::OpCode;
use crate::handshake;
use crate::heartbeat::Heartbeat;
use crate::io_loop;
use crate::message::Message;
use crate::queue::{OutboundItem, SendQueue};
use crate::reconnect;
use crate::state::{ConnState, StateCell};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

struct SessionInner {
    config: Mutex<SessionConfig>,
    state: Arc<StateCell>,
    callbacks: Arc<Callbacks>,
    send_queue: Arc<SendQueue>,
    transport: Mutex<Option<Arc<Mutex<Transport>>>>,
    heartbeat: Mutex<Option<Arc<Heartbeat>>>,
    pinned_core: Mutex<Option<core_affinity::CoreId>>,
    reconnect_attempts: AtomicU32,
    pending_disconnect_code: Mutex<Option<u16>>,
    last_close_code: Mutex<Option<u16>>,
    running: Arc<AtomicBool>,
    started: AtomicBool,
    finished: Mutex<bool>,
    finished_cv: Condvar,
    controller_thread: Mutex<Option<JoinHandle<()>>>,
}

/// A WebSocket client session. Cheap to clone — every clone shares the same
/// underlying connection, threads, and callback storage.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Session {
            inner: Arc::new(SessionInner {
                config: Mutex::new(config),
                state: Arc::new(StateCell::default()),
                callbacks: Arc::new(Callbacks::default()),
                send_queue: Arc::new(SendQueue::new()),
                transport: Mutex::new(None),
                heartbeat: Mutex::new(None),
                pinned_core: Mutex::new(None),
                reconnect_attempts: AtomicU32::new(0),
                pending_disconnect_code: Mutex::new(None),
                last_close_code: Mutex::new(None),
                running: Arc::new(AtomicBool::new(false)),
                started: AtomicBool::new(false),
                finished: Mutex::new(true),
                finished_cv: Condvar::new(),
                controller_thread: Mutex::new(None),
            }),
        }
    }

    // -- lifecycle -----------------------------------------------------------

    /// Starts the controller thread (idempotent: a second call while already
    /// connecting/connected is a no-op, per §6).
    pub fn connect(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.started.store(true, Ordering::SeqCst);
        *self.inner.finished.lock().unwrap() = false;

        let inner = Arc::clone(&self.inner);
        let handle = std::thread::spawn(move || run_controller(inner));
        *self.inner.controller_thread.lock().unwrap() = Some(handle);
    }

    /// Idempotent (§5 "Cancellation"): clears the running flag, sends a best-effort
    /// Close frame, and blocks until the controller and heartbeat threads exit.
    pub fn disconnect(&self, code: u16) {
        if !self.inner.started.load(Ordering::SeqCst) {
            return;
        }
        *self.inner.pending_disconnect_code.lock().unwrap() = Some(code);
        self.inner.running.store(false, Ordering::SeqCst);

        if let Some(transport) = self.inner.transport.lock().unwrap().clone() {
            let _ = io_loop::send_frame(&transport, OpCode::Close, &code.to_be_bytes());
            transport.lock().unwrap().shutdown();
        }

        self.wait();
    }

    /// Blocks until the controller thread (and therefore the I/O and heartbeat
    /// threads it owns) has exited. Safe to call from multiple threads.
    pub fn wait(&self) {
        if !self.inner.started.load(Ordering::SeqCst) {
            return;
        }
        let mut done = self.inner.finished.lock().unwrap();
        while !*done {
            done = self.inner.finished_cv.wait(done).unwrap();
        }
        drop(done);
        if let Some(handle) = self.inner.controller_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.get() == ConnState::Open
    }

    pub fn state(&self) -> ConnState {
        self.inner.state.get()
    }

    /// The close code from the most recent `Disconnected` event, if any (§3 Session
    /// state "last_close_code"). Lets a caller inspect the effective code after
    /// `wait()` returns without wiring up a second channel around `onDisconnect`.
    pub fn last_close_code(&self) -> Option<u16> {
        *self.inner.last_close_code.lock().unwrap()
    }

    // -- sending ---------------------------------------------------------------

    /// Synchronous Text send, serialized under the transport's send lock (§4.3/§5).
    pub fn send(&self, text: &str) -> Result<(), Error> {
        let transport = self.current_transport()?;
        io_loop::send_frame(&transport, OpCode::Text, text.as_bytes())
    }

    pub fn send_binary(&self, data: &[u8]) -> Result<(), Error> {
        let transport = self.current_transport()?;
        io_loop::send_frame(&transport, OpCode::Binary, data)
    }

    /// Enqueues a Text payload for the I/O thread to drain (§4.3); never blocks.
    pub fn send_async(&self, text: &str) {
        self.inner
            .send_queue
            .push(OutboundItem::Text(text.as_bytes().to_vec()));
    }

    pub fn send_ping(&self, payload: Option<Vec<u8>>) -> Result<(), Error> {
        let transport = self.current_transport()?;
        io_loop::send_frame(&transport, OpCode::Ping, &payload.unwrap_or_default())
    }

    pub fn send_pong(&self, payload: &[u8]) -> Result<(), Error> {
        let transport = self.current_transport()?;
        io_loop::send_frame(&transport, OpCode::Pong, payload)
    }

    fn current_transport(&self) -> Result<Arc<Mutex<Transport>>, Error> {
        self.inner
            .transport
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::Disconnected)
    }

    // -- runtime mutators (§6) ---------------------------------------------------

    /// Rejects an invalid core index without touching any thread state (§5).
    pub fn pin_thread(&self, core: usize) -> Result<(), Error> {
        let ids = core_affinity::get_core_ids().ok_or(Error::InvalidCoreIndex(core))?;
        let id = ids
            .into_iter()
            .find(|c| c.id == core)
            .ok_or(Error::InvalidCoreIndex(core))?;
        *self.inner.pinned_core.lock().unwrap() = Some(id);
        Ok(())
    }

    pub fn set_ping_mode(&self, mode: PingMode) {
        self.inner.config.lock().unwrap().heartbeat.mode = mode;
        if let Some(hb) = self.inner.heartbeat.lock().unwrap().as_ref() {
            hb.set_mode(mode);
        }
    }

    pub fn set_ping_interval(&self, interval: Duration) {
        self.inner.config.lock().unwrap().heartbeat.interval = interval;
        if let Some(hb) = self.inner.heartbeat.lock().unwrap().as_ref() {
            hb.set_interval(interval);
        }
    }

    pub fn set_ping_timeout(&self, timeout: Duration) {
        self.inner.config.lock().unwrap().heartbeat.timeout = timeout;
        if let Some(hb) = self.inner.heartbeat.lock().unwrap().as_ref() {
            hb.set_timeout(timeout);
        }
    }

    pub fn set_auto_pong(&self, enabled: bool) {
        self.inner.config.lock().unwrap().heartbeat.auto_pong = enabled;
        if let Some(hb) = self.inner.heartbeat.lock().unwrap().as_ref() {
            hb.set_auto_pong(enabled);
        }
    }

    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.inner.config.lock().unwrap().auto_reconnect = enabled;
    }

    // -- callback registration (§6, §9 "Callback storage") ------------------------

    pub fn on_connect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.inner.callbacks.set_on_connect(f);
    }

    pub fn on_disconnect(&self, f: impl Fn(Option<u16>) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_disconnect(f);
    }

    pub fn on_error(&self, f: impl Fn(ErrorCode, &str) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_error(f);
    }

    pub fn on_raw_message(&self, f: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_raw_message(f);
    }

    pub fn on_message(&self, f: impl Fn(&Message) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_message(f);
    }

    pub fn on_ping(&self, f: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_ping(f);
    }

    pub fn on_pong(&self, f: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_pong(f);
    }
}

/// Body of the controller thread: connect, run the I/O loop, and on an abnormal
/// exit either back off and retry (§4.9/§7) or settle into `Closed`.
fn run_controller(inner: Arc<SessionInner>) {
    loop {
        if !inner.running.load(Ordering::SeqCst) {
            break;
        }

        inner.state.set(ConnState::Connecting);
        let config = inner.config.lock().unwrap().clone();

        let (abnormal, should_continue) = match handshake::connect(&config) {
            Ok(outcome) => {
                let transport = Arc::new(Mutex::new(outcome.transport));
                *inner.transport.lock().unwrap() = Some(Arc::clone(&transport));
                inner.state.set(ConnState::Open);
                inner.reconnect_attempts.store(0, Ordering::SeqCst);
                inner.callbacks.fire_connect();

                let hb_transport = Arc::clone(&transport);
                let hb_callbacks = Arc::clone(&inner.callbacks);
                let hb_running = Arc::clone(&inner.running);
                let heartbeat = Arc::new(Heartbeat::spawn(
                    config.heartbeat.clone(),
                    Arc::clone(&inner.send_queue),
                    move || {
                        hb_callbacks.fire_error(ErrorCode::PingTimeout, "pong deadline exceeded");
                        if hb_running.load(Ordering::SeqCst) {
                            hb_transport.lock().unwrap().shutdown();
                        }
                    },
                ));
                *inner.heartbeat.lock().unwrap() = Some(Arc::clone(&heartbeat));

                let pinned_core = *inner.pinned_core.lock().unwrap();
                let exit = io_loop::run(
                    Arc::clone(&transport),
                    Arc::clone(&inner.send_queue),
                    &config,
                    Arc::clone(&inner.state),
                    Arc::clone(&inner.callbacks),
                    Arc::clone(&heartbeat),
                    Arc::clone(&inner.running),
                    pinned_core,
                );

                heartbeat.stop();
                *inner.heartbeat.lock().unwrap() = None;

                let requested_code = inner.pending_disconnect_code.lock().unwrap().take();
                // A user-requested code wins, then whatever the loop itself resolved
                // (a peer Close frame's status, or a protocol error's mapped code);
                // an abnormal exit with neither (EOF, socket error) reports
                // AbnormalClosure rather than leaving onDisconnect's code empty.
                let effective_code = requested_code.or(exit.close_code).or_else(|| {
                    exit.abnormal.then_some(crate::state::close_code::ABNORMAL_CLOSURE)
                });

                // Unified teardown (§7): every exit path sends a best-effort Close
                // with the effective code before the transport goes away, whether
                // that's a protocol error (MessageTooLarge, InvalidFrame) that never
                // got a chance to write one, an abnormal drop, or the reply to a
                // peer-initiated Close.
                if let Some(code) = effective_code {
                    let _ = io_loop::send_frame(&transport, OpCode::Close, &code.to_be_bytes());
                }
                *inner.transport.lock().unwrap() = None;
                inner.state.set(ConnState::Closed);

                *inner.last_close_code.lock().unwrap() = effective_code;
                inner.callbacks.fire_disconnect(effective_code);

                (exit.abnormal, true)
            }
            Err(e) => {
                log::warn!("connect failed: {e}");
                inner.callbacks.fire_error(e.code(), &e.to_string());
                inner.state.set(ConnState::Closed);
                (true, true)
            }
        };

        if !should_continue {
            break;
        }

        let user_initiated = !inner.running.load(Ordering::SeqCst);
        let attempts = inner.reconnect_attempts.load(Ordering::SeqCst);

        if reconnect::should_reconnect(&config, attempts, abnormal, user_initiated) {
            let attempt = attempts + 1;
            inner.reconnect_attempts.store(attempt, Ordering::SeqCst);
            inner.state.set(ConnState::Reconnecting);
            std::thread::sleep(reconnect::backoff_duration(attempt));
            continue;
        }

        break;
    }

    inner.running.store(false, Ordering::SeqCst);
    *inner.finished.lock().unwrap() = true;
    inner.finished_cv.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;

    fn unmasked_frame(opcode: OpCode, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0x80 | opcode.as_u8(), payload.len() as u8];
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn connect_then_disconnect_round_trip_against_a_local_echo_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let n = sock.read(&mut buf).unwrap(); // handshake request
            let request = String::from_utf8_lossy(&buf[..n]);
            assert!(request.starts_with("GET / HTTP/1.1"));
            let key = request
                .lines()
                .find_map(|l| l.strip_prefix("Sec-WebSocket-Key: "))
                .unwrap()
                .trim();
            let accept = crate::utils::generate_websocket_accept_value(key);
            sock.write_all(
                format!(
                    "HTTP/1.1 101 Switching Protocols\r\n\
                     Upgrade: websocket\r\n\
                     Connection: Upgrade\r\n\
                     Sec-WebSocket-Accept: {accept}\r\n\
                     \r\n"
                )
                .as_bytes(),
            )
            .unwrap();
            // Echo back whatever text frame the client sends.
            let n = sock.read(&mut buf).unwrap();
            sock.write_all(&unmasked_frame(OpCode::Text, &buf[6..n])).unwrap();
            // Wait for the client's close frame, then reply in kind.
            let _ = sock.read(&mut buf);
            let _ = sock.write_all(&unmasked_frame(OpCode::Close, &1000u16.to_be_bytes()));
        });

        let mut config = SessionConfig::new(format!("ws://{addr}/"));
        config.heartbeat.mode = PingMode::Disabled;
        let session = Session::new(config);

        let connected = Arc::new(AtomicUsize::new(0));
        let connected_clone = Arc::clone(&connected);
        session.on_connect(move || {
            connected_clone.fetch_add(1, Ordering::SeqCst);
        });

        let got_message = Arc::new(Mutex::new(None));
        let got_message_clone = Arc::clone(&got_message);
        session.on_message(move |msg| {
            *got_message_clone.lock().unwrap() = Some(msg.clone());
        });

        session.connect();
        std::thread::sleep(Duration::from_millis(100));
        assert!(session.is_connected());
        assert_eq!(connected.load(Ordering::SeqCst), 1);

        session.send("hi").unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(
            got_message.lock().unwrap().take(),
            Some(Message::Text("hi".to_string()))
        );

        session.disconnect(1000);
        assert!(!session.is_connected());
        assert_eq!(session.last_close_code(), Some(1000));
        server.join().unwrap();
    }

    #[test]
    fn disconnect_before_connect_is_a_harmless_no_op() {
        let session = Session::new(SessionConfig::new("ws://127.0.0.1:1/"));
        session.disconnect(1000);
        session.wait();
    }

    #[test]
    fn pin_thread_rejects_out_of_range_core_index() {
        let session = Session::new(SessionConfig::new("ws://127.0.0.1:1/"));
        let err = session.pin_thread(usize::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidCoreIndex(_)));
    }

    #[test]
    fn send_without_a_connection_fails_with_disconnected() {
        let session = Session::new(SessionConfig::new("ws://127.0.0.1:1/"));
        let err = session.send("hi").unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }
}
