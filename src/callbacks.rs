//! Callback storage (spec §6/§9): one optional, independently replaceable slot per
//! event. Each slot is its own mutex so replacing one callback never blocks a
//! dispatch in progress on another, and a dispatch holds its callback's guard only
//! for the duration of the call — never across `disconnect()`.

use crate::error::ErrorCode;
use std::sync::Mutex;

type OnConnect = Box<dyn Fn() + Send + Sync>;
type OnDisconnect = Box<dyn Fn(Option<u16>) + Send + Sync>;
type OnError = Box<dyn Fn(ErrorCode, &str) + Send + Sync>;
type OnRawMessage = Box<dyn Fn(&[u8]) + Send + Sync>;
type OnMessage = Box<dyn Fn(&crate::message::Message) + Send + Sync>;
type OnPing = Box<dyn Fn(&[u8]) + Send + Sync>;
type OnPong = Box<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Default)]
pub struct Callbacks {
    on_connect: Mutex<Option<OnConnect>>,
    on_disconnect: Mutex<Option<OnDisconnect>>,
    on_error: Mutex<Option<OnError>>,
    on_raw_message: Mutex<Option<OnRawMessage>>,
    on_message: Mutex<Option<OnMessage>>,
    on_ping: Mutex<Option<OnPing>>,
    on_pong: Mutex<Option<OnPong>>,
}

macro_rules! slot {
    ($set_name:ident, $fire_name:ident, $field:ident, $cb:ty, ($($arg:ident : $ty:ty),*)) => {
        pub fn $set_name(&self, f: impl Fn($($ty),*) + Send + Sync + 'static) {
            *self.$field.lock().unwrap() = Some(Box::new(f));
        }

        pub fn $fire_name(&self, $($arg: $ty),*) {
            if let Some(cb) = self.$field.lock().unwrap().as_ref() {
                cb($($arg),*);
            }
        }
    };
}

impl Callbacks {
    slot!(set_on_connect, fire_connect, on_connect, OnConnect, ());
    slot!(set_on_disconnect, fire_disconnect, on_disconnect, OnDisconnect, (code: Option<u16>));
    slot!(set_on_error, fire_error, on_error, OnError, (code: ErrorCode, message: &str));
    slot!(set_on_raw_message, fire_raw_message, on_raw_message, OnRawMessage, (payload: &[u8]));
    slot!(set_on_message, fire_message, on_message, OnMessage, (message: &crate::message::Message));
    slot!(set_on_ping, fire_ping, on_ping, OnPing, (payload: &[u8]));
    slot!(set_on_pong, fire_pong, on_pong, OnPong, (payload: &[u8]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn unset_callback_fires_as_a_no_op() {
        let callbacks = Callbacks::default();
        callbacks.fire_connect();
        callbacks.fire_disconnect(Some(1000));
    }

    #[test]
    fn set_callback_is_invoked_with_its_argument() {
        let callbacks = Callbacks::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        callbacks.set_on_disconnect(move |code| {
            seen_clone.store(code.unwrap_or(0) as usize, Ordering::SeqCst);
        });
        callbacks.fire_disconnect(Some(1001));
        assert_eq!(seen.load(Ordering::SeqCst), 1001);
    }

    #[test]
    fn replacing_a_callback_drops_the_old_one() {
        let callbacks = Callbacks::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_a = Arc::clone(&calls);
        callbacks.set_on_connect(move || {
            calls_a.fetch_add(1, Ordering::SeqCst);
        });
        let calls_b = Arc::clone(&calls);
        callbacks.set_on_connect(move || {
            calls_b.fetch_add(10, Ordering::SeqCst);
        });
        callbacks.fire_connect();
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn error_callback_receives_code_and_message() {
        let callbacks = Callbacks::default();
        let received = Arc::new(Mutex::new(None));
        let received_clone = Arc::clone(&received);
        callbacks.set_on_error(move |code, message| {
            *received_clone.lock().unwrap() = Some((code, message.to_string()));
        });
        callbacks.fire_error(ErrorCode::PingTimeout, "pong deadline exceeded");
        let got = received.lock().unwrap().take().unwrap();
        assert_eq!(got.0, ErrorCode::PingTimeout);
        assert_eq!(got.1, "pong deadline exceeded");
    }
}
