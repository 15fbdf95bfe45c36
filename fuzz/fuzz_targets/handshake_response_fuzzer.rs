#![no_main]

use libfuzzer_sys::fuzz_target;
use wavecore::validate_handshake_response;

/// Splits the fuzz input into a fixed key and an arbitrary response buffer so the
/// `httparse`-backed header walk is exercised on malformed/truncated/adversarial
/// HTTP rather than well-formed responses the handshake test suite already covers.
fuzz_target!(|data: &[u8]| {
    let _ = validate_handshake_response(data, "dGhlIHNhbXBsZSBub25jZQ==");
});
