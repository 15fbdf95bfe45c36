//! I/O loop and dispatcher (spec §4.8): the single thread per session that owns the
//! socket for reading, drains the async send queue, decodes inbound frames, and
//! dispatches them to callbacks.

use crate::callbacks::Callbacks;
use crate::config::SessionConfig;
use crate::error::Error;
use crate::frame::{self, FragmentAssembler, OpCode, RawFrame};
use crate::heartbeat::Heartbeat;
use crate::message::Message;
use crate::queue::{OutboundItem, SendQueue};
use crate::state::{close_code, is_abnormal_close, ConnState, StateCell};
use crate::transport::{Leading, Transport};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Readability-wait quantum between send-queue drains (spec §4.8 step 2).
const POLL_QUANTUM: Duration = Duration::from_millis(100);

/// Outcome of one I/O loop run, used by the reconnection controller to decide
/// whether to retry (spec §4.9).
pub struct LoopExit {
    pub close_code: Option<u16>,
    pub abnormal: bool,
}

/// Runs until a Close frame is processed or a fatal error/EOF occurs. Only one
/// thread may run this for a given session at a time.
#[allow(clippy::too_many_arguments)]
pub fn run(
    transport: Arc<Mutex<Transport>>,
    send_queue: Arc<SendQueue>,
    config: &SessionConfig,
    state: Arc<StateCell>,
    callbacks: Arc<Callbacks>,
    heartbeat: Arc<Heartbeat>,
    running: Arc<AtomicBool>,
    pinned_core: Option<core_affinity::CoreId>,
) -> LoopExit {
    if let Some(core) = pinned_core {
        let _ = core_affinity::set_for_current(core);
    }

    {
        let t = transport.lock().unwrap();
        if let Err(e) = t.set_read_timeout(Some(POLL_QUANTUM)) {
            log::warn!("failed to set read timeout: {e}");
        }
    }

    let mut fragments = FragmentAssembler::new();
    let max_message_bytes = config.max_message_size;

    loop {
        if !running.load(Ordering::SeqCst) {
            return LoopExit {
                close_code: None,
                abnormal: false,
            };
        }

        drain_send_queue(&transport, &send_queue);

        let frame = {
            let mut t = transport.lock().unwrap();
            frame::decode_from(&mut *t, max_message_bytes)
        };

        let raw = match frame {
            Ok(raw) => raw,
            Err(Error::IOError { source })
                if matches!(source.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(Error::IOError { source }) if source.kind() == ErrorKind::UnexpectedEof => {
                log::debug!("connection closed by peer (EOF)");
                return LoopExit {
                    close_code: None,
                    abnormal: running.load(Ordering::SeqCst),
                };
            }
            Err(e) => {
                // A caller-initiated `disconnect()` shuts the socket down to unblock
                // this read promptly; that surfaces as an I/O error here too, but it
                // isn't a failure worth reporting to `onError`.
                if !running.load(Ordering::SeqCst) {
                    return LoopExit {
                        close_code: None,
                        abnormal: false,
                    };
                }
                log::warn!("frame decode failed: {e}");
                let close_code = e.protocol_close_code();
                callbacks.fire_error(e.code(), &e.to_string());
                return LoopExit {
                    close_code,
                    abnormal: true,
                };
            }
        };

        if raw.was_masked {
            log::warn!("received masked frame from server; tolerating but this is abnormal");
        }

        match dispatch(raw, &mut fragments, &transport, &callbacks, &heartbeat, max_message_bytes) {
            Ok(DispatchOutcome::Continue) => continue,
            Ok(DispatchOutcome::Close(code)) => {
                state.set(ConnState::Closing);
                return LoopExit {
                    close_code: code,
                    abnormal: is_abnormal_close(code),
                };
            }
            Err(e) => {
                log::warn!("dispatch error: {e}");
                let close_code = e.protocol_close_code();
                callbacks.fire_error(e.code(), &e.to_string());
                return LoopExit {
                    close_code,
                    abnormal: true,
                };
            }
        }
    }
}

enum DispatchOutcome {
    Continue,
    Close(Option<u16>),
}

fn dispatch(
    raw: RawFrame,
    fragments: &mut FragmentAssembler,
    transport: &Arc<Mutex<Transport>>,
    callbacks: &Arc<Callbacks>,
    heartbeat: &Arc<Heartbeat>,
    max_message_bytes: u64,
) -> Result<DispatchOutcome, Error> {
    match raw.opcode {
        OpCode::Text | OpCode::Binary => {
            if raw.fin {
                callbacks.fire_raw_message(&raw.payload);
                let message = Message::from_opcode_and_payload(raw.opcode, raw.payload)?;
                callbacks.fire_message(&message);
            } else {
                fragments.start(raw.opcode, raw.payload)?;
            }
            Ok(DispatchOutcome::Continue)
        }
        OpCode::Continue => {
            if let Some((opcode, payload)) = fragments.append(&raw.payload, raw.fin, max_message_bytes)? {
                callbacks.fire_raw_message(&payload);
                let message = Message::from_opcode_and_payload(opcode, payload)?;
                callbacks.fire_message(&message);
            }
            Ok(DispatchOutcome::Continue)
        }
        OpCode::Ping => {
            // Auto-pong is enqueued before the ping callback runs (spec §4.6/§4.8).
            if heartbeat.auto_pong_enabled() {
                send_frame(transport, OpCode::Pong, &raw.payload)?;
            }
            callbacks.fire_ping(&raw.payload);
            Ok(DispatchOutcome::Continue)
        }
        OpCode::Pong => {
            heartbeat.record_pong();
            callbacks.fire_pong(&raw.payload);
            Ok(DispatchOutcome::Continue)
        }
        OpCode::Close => {
            // A Close payload shorter than 2 bytes carries no status code; report
            // NoStatusReceived (1005) rather than propagating `None` up to the
            // caller, so `onDisconnect` always sees a concrete effective code here
            // (an EOF/abnormal-drop exit with no Close frame at all is the only case
            // that still reports `None` out of `dispatch`, mapped to AbnormalClosure
            // by the controller per §4.9/§4.10). The reply Close echoing this code
            // is sent by the session's unified teardown (§7), not here, so every
            // exit path funnels through a single best-effort Close write.
            let code = if raw.payload.len() >= 2 {
                u16::from_be_bytes([raw.payload[0], raw.payload[1]])
            } else {
                close_code::NO_STATUS_RECEIVED
            };
            Ok(DispatchOutcome::Close(Some(code)))
        }
    }
}

/// Drains the async send queue, encoding and writing each item as its own frame
/// under the send lock (spec §4.8 step 1, generalized to all outbound item kinds so
/// heartbeat pings/pongs and `sendAsync` share one drain path).
fn drain_send_queue(transport: &Arc<Mutex<Transport>>, send_queue: &Arc<SendQueue>) {
    while let Some(item) = send_queue.pop() {
        let (opcode, payload) = match item {
            OutboundItem::Text(p) => (OpCode::Text, p),
            OutboundItem::Binary(p) => (OpCode::Binary, p),
            OutboundItem::Ping(p) => (OpCode::Ping, p),
            OutboundItem::Pong(p) => (OpCode::Pong, p),
        };
        if let Err(e) = send_frame(transport, opcode, &payload) {
            log::warn!("failed to send queued frame: {e}");
        }
    }
}

/// Encodes one frame with a fresh random mask and writes it under the send lock
/// (spec §5 "send mutex" — every writer, sync or async, goes through this).
pub fn send_frame(transport: &Arc<Mutex<Transport>>, opcode: OpCode, payload: &[u8]) -> Result<(), Error> {
    let mut rng = rand::thread_rng();
    let encoded = frame::encode(opcode, payload, &mut rng);
    let mut t = transport.lock().unwrap();
    t.write_all(&encoded)
}
